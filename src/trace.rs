use crate::canvas::{self, Axis, Canvas, FigureSpec, Marker, SeriesStyle, TickStyle};
use crate::chains::chain_boundaries;
use crate::color::{Color, DEFAULT_BLUE};
use crate::error::Result;
use crate::layout::{axis_ticks, padded_limits, panel_grid, PairStyle, RendererKind, SubplotAdjust};
use crate::names::{resolve_names, NameFormatter};
use crate::utils::{check_samples, check_thinning, extent, thin};
use crate::{Array1, Array2, Outcome, SkipReason};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;

const FIGSIZE: (f64, f64) = (8.0, 8.0);
const FONT_SIZE: f64 = 10.0;
const ADJUST: SubplotAdjust = SubplotAdjust {
    left: 0.15,
    right: 0.95,
    bottom: 0.10,
    top: 0.90,
    hspace: 0.3,
    wspace: 0.2,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub title: Option<String>,
    /// Plot every `thinning`-th pooled sample.
    pub thinning: usize,
    /// Samples each chain contributes to the pooled axis.  When set, a
    /// vertical line marks every chain boundary.
    pub chain_len: Option<usize>,
    pub save_path: Option<PathBuf>,
    pub formatter: NameFormatter,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            title: None,
            thinning: 1,
            chain_len: None,
            save_path: None,
            formatter: NameFormatter::default(),
        }
    }
}

/// Positions of the chain separators on the thinned axis: the boundaries
/// between the `pooled_len / chain_len` chains, each divided by `thinning`.
pub fn separator_positions(chain_len: usize, thinning: usize, pooled_len: usize) -> Array1 {
    if chain_len == 0 || thinning == 0 {
        return Vec::new();
    }
    chain_boundaries(pooled_len / chain_len, chain_len)
        .into_iter()
        .map(|b| b as f64 / thinning as f64)
        .collect()
}

/// Plots the sampled values of each parameter against the pooled iteration
/// index, one panel per parameter stacked vertically.
///
/// # Arguments
/// * `samples` - One row per parameter, chains pooled after burn-in
/// * `names` - Raw parameter names; `P0, P1, ...` when absent
pub fn trace(
    canvas: &mut dyn Canvas,
    samples: &Array2,
    names: Option<&[String]>,
    config: &TraceConfig,
) -> Result<Outcome> {
    check_thinning(config.thinning)?;
    let names = resolve_names(names, samples.len());
    check_samples(samples, names.len())?;

    let grid = panel_grid(RendererKind::Trace, samples.len(), PairStyle::default());
    if grid.is_empty() {
        debug!("no parameters to trace");
        return Ok(Outcome::Skipped(SkipReason::NoParameters));
    }
    let labels = config.formatter.format_all(&names);
    let thinned: Array2 = samples.iter().map(|row| thin(row, config.thinning)).collect();
    let xmax = thinned[0].len();
    let xs: Array1 = (0..xmax).map(|i| i as f64).collect();
    let separators = config
        .chain_len
        .map(|len| separator_positions(len, config.thinning, samples[0].len()))
        .unwrap_or_default();
    let x_label = if config.thinning > 1 {
        "MCMC (thinned) iteration"
    } else {
        "MCMC iteration"
    };

    let figure = FigureSpec::new(FIGSIZE.0, FIGSIZE.1).with_title(config.title.as_deref());
    canvas.begin_figure(&figure)?;
    let sample_style = SeriesStyle::markers(DEFAULT_BLUE, Marker::Point, 2.0);
    let separator_style = SeriesStyle::line(Color::grey(0.3), 1.0);
    for panel in &grid.panels {
        let param = panel.y_param.unwrap_or(panel.row);
        let ys = &thinned[param];
        let ax = canvas.add_axes(ADJUST.cell(grid.rows, grid.cols, panel.row, panel.col))?;
        canvas.line_series(ax, &xs, ys, &sample_style)?;

        let (lo, hi) = extent(ys).map_or((0.0, 1.0), |(lo, hi)| padded_limits(lo, hi));
        if !separators.is_empty() {
            canvas.vertical_lines(ax, &separators, (lo, hi), &separator_style)?;
        }
        canvas.set_limits(ax, Axis::X, 0.0, xmax as f64)?;
        canvas.set_limits(ax, Axis::Y, lo, hi)?;

        canvas.set_ticks(
            ax,
            Axis::Y,
            &axis_ticks(lo, hi, panel.reduce_ticks),
            &TickStyle::visible(FONT_SIZE),
        )?;
        let x_style = if panel.x_ticks {
            TickStyle::visible(FONT_SIZE)
        } else {
            TickStyle::hidden()
        };
        canvas.set_ticks(
            ax,
            Axis::X,
            &axis_ticks(0.0, xmax as f64, panel.reduce_ticks),
            &x_style,
        )?;

        canvas.set_label(ax, Axis::Y, &labels[param], FONT_SIZE + 4.0)?;
        canvas.set_label_coords(ax, Axis::Y, -0.1, 0.5)?;
        if panel.x_label {
            canvas.set_label(ax, Axis::X, x_label, FONT_SIZE + 4.0)?;
        }
    }
    canvas::finish(canvas, config.save_path.as_deref())?;
    Ok(Outcome::Drawn {
        panels: grid.len(),
    })
}
