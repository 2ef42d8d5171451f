use crate::canvas::{self, AxesId, Axis, Canvas, FigureSpec, SeriesStyle, TickStyle};
use crate::color::DEFAULT_BLUE;
use crate::error::Result;
use crate::layout::{axis_ticks, panel_grid, PairStyle, RendererKind, SubplotAdjust};
use crate::names::{resolve_names, NameFormatter};
use crate::utils::{check_samples, check_thinning, histogram as bin_values, thin};
use crate::{Array2, Outcome, SkipReason};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;

/// Bins per marginal histogram.
pub const BINS: usize = 20;

const WIDTH: f64 = 8.0;
const FONT_SIZE: f64 = 14.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    pub title: Option<String>,
    pub thinning: usize,
    pub save_path: Option<PathBuf>,
    pub formatter: NameFormatter,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            title: None,
            thinning: 1,
            save_path: None,
            formatter: NameFormatter::default(),
        }
    }
}

fn adjust(rows: usize) -> SubplotAdjust {
    SubplotAdjust {
        left: 0.1,
        right: 0.95,
        bottom: if rows == 1 { 0.25 } else { 0.15 },
        top: 0.9,
        hspace: 0.1,
        wspace: 0.1,
    }
}

/// Draws the marginal posterior of every parameter on a rectangular grid
/// with one y scale for all panels.
///
/// The tallest bar is only known once every panel has been binned and
/// drawn, so the common y range is applied in a second pass.
pub fn histogram(
    canvas: &mut dyn Canvas,
    samples: &Array2,
    names: Option<&[String]>,
    config: &HistogramConfig,
) -> Result<Outcome> {
    check_thinning(config.thinning)?;
    let names = resolve_names(names, samples.len());
    check_samples(samples, names.len())?;

    let grid = panel_grid(RendererKind::Histogram, samples.len(), PairStyle::default());
    if grid.is_empty() {
        debug!("no parameters to histogram");
        return Ok(Outcome::Skipped(SkipReason::NoParameters));
    }
    let labels = config.formatter.format_all(&names);
    let height = (2.0 + 2.0 * grid.rows as f64).min(8.0);
    let adjust = adjust(grid.rows);

    canvas.begin_figure(&FigureSpec::new(WIDTH, height).with_title(config.title.as_deref()))?;
    let style = SeriesStyle::line(DEFAULT_BLUE, 1.0);
    let mut drawn: Vec<(AxesId, bool)> = Vec::with_capacity(grid.len());
    let mut max_count = 0.0_f64;
    for panel in &grid.panels {
        let param = panel.x_param.unwrap_or(panel.row * grid.cols + panel.col);
        let ax = canvas.add_axes(adjust.cell(grid.rows, grid.cols, panel.row, panel.col))?;
        let hist = bin_values(&thin(&samples[param], config.thinning), BINS);
        canvas.histogram(ax, &hist, &style)?;

        let (lo, hi) = (hist.edges[0], hist.edges[hist.edges.len() - 1]);
        canvas.set_limits(ax, Axis::X, lo, hi)?;
        canvas.set_ticks(
            ax,
            Axis::X,
            &axis_ticks(lo, hi, panel.reduce_ticks),
            &TickStyle::visible(FONT_SIZE).rotated(90.0),
        )?;
        canvas.set_label(ax, Axis::X, &labels[param], FONT_SIZE)?;
        max_count = max_count.max(hist.max_count());
        drawn.push((ax, panel.y_ticks));
    }

    let upper = if max_count > 0.0 { max_count } else { 1.0 };
    let y_ticks = axis_ticks(0.0, upper, false);
    for (ax, show_ticks) in drawn {
        canvas.set_limits(ax, Axis::Y, 0.0, upper)?;
        let y_style = if show_ticks {
            TickStyle::visible(FONT_SIZE)
        } else {
            TickStyle::hidden()
        };
        canvas.set_ticks(ax, Axis::Y, &y_ticks, &y_style)?;
    }
    canvas::finish(canvas, config.save_path.as_deref())?;
    Ok(Outcome::Drawn {
        panels: grid.len(),
    })
}
