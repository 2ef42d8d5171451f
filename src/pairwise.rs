use crate::canvas::{
    self, AxesId, Axis, Canvas, DensityImage, FigureSpec, Marker, Rect, SeriesStyle, TickStyle,
};
use crate::color::{Colormap, DEFAULT_BLUE};
use crate::error::Result;
use crate::layout::{
    axis_ticks, padded_limits, pairwise_label_offset, panel_grid, PairStyle, Panel, PanelGrid,
    PanelKind, RendererKind, SubplotAdjust,
};
use crate::names::{resolve_names, NameFormatter};
use crate::utils::{check_samples, check_thinning, extent, histogram, histogram2d, linspace, thin};
use crate::{Array2, Outcome, SkipReason};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;

/// Bins per axis of every histogram in the grid.
pub const BINS: usize = 20;
pub const COLORBAR_LABEL: &str = "Normalized Point Density";

const FIGSIZE: (f64, f64) = (8.0, 8.0);
const FONT_SIZE: f64 = 10.0;
const ADJUST: SubplotAdjust = SubplotAdjust {
    left: 0.15,
    right: 0.85,
    bottom: 0.15,
    top: 0.85,
    hspace: 0.3,
    wspace: 0.3,
};
const COLORBAR_RECT: Rect = Rect::new(0.85, 0.535, 0.025, 0.36);
const COLORBAR_BOUNDS: usize = 64;
const COLORBAR_TICKS: usize = 5;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PairwiseConfig {
    pub title: Option<String>,
    /// Use every `thinning`-th sample for the histograms.
    pub thinning: usize,
    pub style: PairStyle,
    pub save_path: Option<PathBuf>,
    pub formatter: NameFormatter,
}

impl Default for PairwiseConfig {
    fn default() -> Self {
        Self {
            title: None,
            thinning: 1,
            style: PairStyle::Hist,
            save_path: None,
            formatter: NameFormatter::default(),
        }
    }
}

/// Draws the lower triangle of a parameter-by-parameter grid: joint
/// densities (or scatters) below the diagonal, marginal histograms on it.
///
/// A single parameter has nothing to pair with and draws nothing.  In density
/// mode every panel is normalized to its own peak so one colorbar on [0, 1]
/// serves the whole grid.
pub fn pairwise(
    canvas: &mut dyn Canvas,
    samples: &Array2,
    names: Option<&[String]>,
    config: &PairwiseConfig,
) -> Result<Outcome> {
    check_thinning(config.thinning)?;
    let names = resolve_names(names, samples.len());
    check_samples(samples, names.len())?;

    let grid = panel_grid(RendererKind::Pairwise, samples.len(), config.style);
    if grid.is_empty() {
        let reason = if samples.is_empty() {
            SkipReason::NoParameters
        } else {
            SkipReason::NothingToPair
        };
        debug!("pairwise plot skipped: {:?}", reason);
        return Ok(Outcome::Skipped(reason));
    }
    let labels = config.formatter.format_all(&names);
    let thinned: Array2 = samples.iter().map(|row| thin(row, config.thinning)).collect();
    let palette = Colormap::yl_or_rd();

    let figure = FigureSpec::new(FIGSIZE.0, FIGSIZE.1).with_title(config.title.as_deref());
    canvas.begin_figure(&figure)?;
    let mut placed = Vec::with_capacity(grid.len());
    for panel in &grid.panels {
        let ax = canvas.add_axes(ADJUST.cell(grid.rows, grid.cols, panel.row, panel.col))?;
        let x = panel.x_param.unwrap_or(panel.col);
        let (x_lim, y_lim) = match (panel.kind, panel.y_param) {
            (PanelKind::Density, Some(y)) => {
                let hist = histogram2d(&thinned[x], &thinned[y], BINS);
                let image = DensityImage::from_histogram2d(&hist);
                canvas.density_image(ax, &image, &palette, 0.0)?;
                let (x0, x1, y0, y1) = image.extent;
                ((x0, x1), (y0, y1))
            }
            (PanelKind::Scatter, Some(y)) => {
                let style = SeriesStyle::markers(DEFAULT_BLUE, Marker::Pixel, 1.0);
                canvas.line_series(ax, &samples[x], &samples[y], &style)?;
                (padded_extent(&samples[x]), padded_extent(&samples[y]))
            }
            _ => {
                let hist = histogram(&thinned[x], BINS);
                canvas.histogram(ax, &hist, &SeriesStyle::line(DEFAULT_BLUE, 1.0))?;
                let x_lim = (hist.edges[0], hist.edges[hist.edges.len() - 1]);
                (x_lim, (0.0, 1.05 * hist.max_count().max(1.0)))
            }
        };
        canvas.set_limits(ax, Axis::X, x_lim.0, x_lim.1)?;
        canvas.set_limits(ax, Axis::Y, y_lim.0, y_lim.1)?;
        set_panel_ticks(canvas, ax, panel, x_lim, y_lim)?;

        if panel.y_label {
            canvas.set_label(ax, Axis::Y, &labels[panel.row], FONT_SIZE + 4.0)?;
        }
        if panel.x_label {
            canvas.set_label(ax, Axis::X, &labels[panel.col], FONT_SIZE + 4.0)?;
        }
        placed.push((ax, *panel));
    }
    align_labels(canvas, &grid, &placed)?;

    if config.style == PairStyle::Hist {
        canvas.colorbar(
            COLORBAR_RECT,
            &palette,
            &linspace(0.0, 1.0, COLORBAR_BOUNDS),
            &linspace(0.0, 1.0, COLORBAR_TICKS),
            COLORBAR_LABEL,
        )?;
    }
    canvas::finish(canvas, config.save_path.as_deref())?;
    Ok(Outcome::Drawn {
        panels: grid.len(),
    })
}

fn padded_extent(values: &[f64]) -> (f64, f64) {
    extent(values).map_or((0.0, 1.0), |(lo, hi)| padded_limits(lo, hi))
}

fn set_panel_ticks(
    canvas: &mut dyn Canvas,
    ax: AxesId,
    panel: &Panel,
    x_lim: (f64, f64),
    y_lim: (f64, f64),
) -> Result<()> {
    let x_style = if panel.x_ticks {
        TickStyle::visible(FONT_SIZE).rotated(90.0)
    } else {
        TickStyle::hidden()
    };
    let y_style = if panel.y_ticks {
        TickStyle::visible(FONT_SIZE)
    } else {
        TickStyle::hidden()
    };
    let x_ticks = axis_ticks(x_lim.0, x_lim.1, panel.reduce_ticks);
    let y_ticks = axis_ticks(y_lim.0, y_lim.1, panel.reduce_ticks);
    canvas.set_ticks(ax, Axis::X, &x_ticks, &x_style)?;
    canvas.set_ticks(ax, Axis::Y, &y_ticks, &y_style)?;
    Ok(())
}

/// Lines up the outer axis labels once every panel exists.  The offset
/// grows with the grid size since each panel shrinks.
fn align_labels(
    canvas: &mut dyn Canvas,
    grid: &PanelGrid,
    placed: &[(AxesId, Panel)],
) -> Result<()> {
    let offset = pairwise_label_offset(grid.rows);
    for (ax, panel) in placed {
        if panel.row == grid.rows - 1 {
            canvas.set_label_coords(*ax, Axis::X, 0.5, offset)?;
        }
        if panel.col == 0 {
            canvas.set_label_coords(*ax, Axis::Y, offset, 0.5)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{Op, Recorder};

    /// Three parameters: a ramp, its square and a constant-step saw.
    fn samples(len: usize) -> Array2 {
        let ramp: Vec<f64> = (0..len).map(|i| i as f64 / len as f64).collect();
        let square = ramp.iter().map(|x| x * x).collect();
        let saw = (0..len).map(|i| (i % 7) as f64).collect();
        vec![ramp, square, saw]
    }

    #[test]
    fn test_panel_count_is_triangular() {
        for k in 2..6 {
            let data: Array2 = (0..k)
                .map(|p| (0..50).map(|i| ((i * (p + 1)) % 13) as f64).collect())
                .collect();
            let mut canvas = Recorder::new();
            let outcome = pairwise(&mut canvas, &data, None, &PairwiseConfig::default()).unwrap();
            assert_eq!(outcome.panels(), k * (k + 1) / 2);
            assert_eq!(
                canvas.count(|op| matches!(op, Op::AddAxes(_))),
                k * (k + 1) / 2
            );
            assert_eq!(canvas.count(|op| matches!(op, Op::Hist { .. })), k);
            assert_eq!(
                canvas.count(|op| matches!(op, Op::Density { .. })),
                k * (k - 1) / 2
            );
        }
    }

    #[test]
    fn test_single_parameter_is_noop() {
        let mut canvas = Recorder::new();
        let data = vec![vec![1.0, 2.0, 3.0]];
        let outcome = pairwise(&mut canvas, &data, None, &PairwiseConfig::default()).unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::NothingToPair));
        assert_eq!(outcome.panels(), 0);
        assert!(canvas.ops.is_empty());

        let outcome = pairwise(&mut canvas, &Vec::new(), None, &PairwiseConfig::default()).unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::NoParameters));
    }

    #[test]
    fn test_density_is_normalized_with_empty_cells_transparent() {
        let mut canvas = Recorder::new();
        pairwise(&mut canvas, &samples(400), None, &PairwiseConfig::default()).unwrap();
        let images: Vec<&DensityImage> = canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Density { image, lower_bound, .. } => {
                    assert_eq!(*lower_bound, 0.0);
                    Some(image)
                }
                _ => None,
            })
            .collect();
        assert_eq!(images.len(), 3);
        for image in images {
            assert_eq!((image.nx, image.ny), (BINS, BINS));
            let finite: Vec<f64> = image.values.iter().copied().filter(|v| !v.is_nan()).collect();
            assert!(finite.iter().all(|&v| v > 0.0 && v <= 1.0));
            assert_abs_diff_eq!(
                finite.iter().copied().fold(0.0, f64::max),
                1.0,
                epsilon = 1e-12
            );
            // A curve or a few levels cannot fill a 20x20 grid.
            assert!(finite.len() < BINS * BINS);
        }
    }

    #[test]
    fn test_colorbar_once_in_density_mode_only() {
        let mut canvas = Recorder::new();
        pairwise(&mut canvas, &samples(100), None, &PairwiseConfig::default()).unwrap();
        let bars: Vec<&Op> = canvas
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Colorbar { .. }))
            .collect();
        assert_eq!(bars.len(), 1);
        if let Op::Colorbar { bounds, ticks, label, rect } = bars[0] {
            assert_eq!(bounds.len(), 64);
            assert_eq!(ticks, &vec![0.0, 0.25, 0.5, 0.75, 1.0]);
            assert_eq!(label, COLORBAR_LABEL);
            assert_eq!(*rect, COLORBAR_RECT);
        }

        let mut canvas = Recorder::new();
        let config = PairwiseConfig {
            style: PairStyle::Points,
            thinning: 4,
            ..Default::default()
        };
        pairwise(&mut canvas, &samples(100), None, &config).unwrap();
        assert_eq!(canvas.count(|op| matches!(op, Op::Colorbar { .. })), 0);
        assert_eq!(canvas.count(|op| matches!(op, Op::Density { .. })), 0);
        // Scatters show every sample; histograms use the thinned ones.
        for op in &canvas.ops {
            match op {
                Op::Line { xs, .. } => assert_eq!(xs.len(), 100),
                Op::Hist { hist, .. } => assert_eq!(hist.counts.iter().sum::<f64>(), 25.0),
                _ => {}
            }
        }
    }

    #[test]
    fn test_labels_aligned_after_grid_is_complete() {
        let mut canvas = Recorder::new();
        let names = vec!["alpha".to_string(), "beta".to_string(), "H2O".to_string()];
        pairwise(
            &mut canvas,
            &samples(60),
            Some(&names),
            &PairwiseConfig::default(),
        )
        .unwrap();

        let last_draw = canvas
            .ops
            .iter()
            .rposition(|op| matches!(op, Op::AddAxes(_) | Op::Ticks { .. } | Op::Label { .. }))
            .unwrap();
        let first_coords = canvas
            .ops
            .iter()
            .position(|op| matches!(op, Op::LabelCoords { .. }))
            .unwrap();
        assert!(first_coords > last_draw);

        let offset = -0.155 * 3.0;
        for op in &canvas.ops {
            if let Op::LabelCoords { axis, x, y, .. } = op {
                match axis {
                    Axis::X => assert_eq!((*x, *y), (0.5, offset)),
                    Axis::Y => assert_eq!((*x, *y), (offset, 0.5)),
                }
            }
        }
        // Column 0 carries the y labels, the bottom row the x labels.
        let y: Vec<String> = canvas.labels(Axis::Y).into_iter().map(|(_, t)| t).collect();
        assert_eq!(y, vec!["\u{03b1}", "\u{03b2}", "H\u{2082}O"]);
        let x: Vec<String> = canvas.labels(Axis::X).into_iter().map(|(_, t)| t).collect();
        assert_eq!(x, vec!["\u{03b1}", "\u{03b2}", "H\u{2082}O"]);
    }

    #[test]
    fn test_tick_visibility_follows_grid() {
        let mut canvas = Recorder::new();
        pairwise(&mut canvas, &samples(60), None, &PairwiseConfig::default()).unwrap();
        // Axes are created row by row: (0,0) (1,0) (1,1) (2,0) (2,1) (2,2).
        assert!(!canvas.ticks(0, Axis::Y).unwrap().1.visible);
        assert!(canvas.ticks(1, Axis::Y).unwrap().1.visible);
        assert!(!canvas.ticks(2, Axis::Y).unwrap().1.visible);
        assert!(!canvas.ticks(1, Axis::X).unwrap().1.visible);
        let (_, style) = canvas.ticks(4, Axis::X).unwrap();
        assert!(style.visible);
        assert_eq!(style.rotation, 90.0);
    }
}
