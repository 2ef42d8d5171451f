//! Panel grids for the multi-panel figures.
//!
//! A [`PanelGrid`] depends only on the parameter count and the kind of figure,
//! and is rebuilt on every call.
use crate::canvas::{Axis, Rect};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    Trace,
    Pairwise,
    Histogram,
}

/// What the off-diagonal panels of a pairwise grid show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStyle {
    /// 2D density image.
    Hist,
    /// Raw point scatter.
    Points,
}

impl Default for PairStyle {
    fn default() -> Self {
        PairStyle::Hist
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Trace,
    Histogram,
    Density,
    Scatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Panel {
    pub row: usize,
    pub col: usize,
    pub kind: PanelKind,
    /// Parameter along the x axis (`None` for the iteration axis).
    pub x_param: Option<usize>,
    /// Parameter along the y axis (`None` for counts).
    pub y_param: Option<usize>,
    pub x_ticks: bool,
    pub y_ticks: bool,
    pub x_label: bool,
    pub y_label: bool,
    /// Thin out the automatic ticks with [`reduce_ticks`].
    pub reduce_ticks: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelGrid {
    pub rows: usize,
    pub cols: usize,
    pub panels: Vec<Panel>,
    /// Axis whose limits are the same on every panel.
    pub shared_axis: Option<Axis>,
    /// Whether all panels map density to one color scale.
    pub shared_color: bool,
}

impl PanelGrid {
    fn empty() -> Self {
        Self {
            rows: 0,
            cols: 0,
            panels: Vec::new(),
            shared_axis: None,
            shared_color: false,
        }
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn panel_at(&self, row: usize, col: usize) -> Option<&Panel> {
        self.panels.iter().find(|p| p.row == row && p.col == col)
    }
}

/// Lays out the panels for `count` parameters.
///
/// An empty grid comes back when there is nothing to draw: no parameters at
/// all, or a single parameter for a pairwise figure.
pub fn panel_grid(kind: RendererKind, count: usize, style: PairStyle) -> PanelGrid {
    if count == 0 {
        return PanelGrid::empty();
    }
    match kind {
        RendererKind::Trace => trace_grid(count),
        RendererKind::Pairwise if count == 1 => PanelGrid::empty(),
        RendererKind::Pairwise => pairwise_grid(count, style),
        RendererKind::Histogram => histogram_grid(count),
    }
}

fn trace_grid(count: usize) -> PanelGrid {
    let panels = (0..count)
        .map(|i| {
            let last = i == count - 1;
            Panel {
                row: i,
                col: 0,
                kind: PanelKind::Trace,
                x_param: None,
                y_param: Some(i),
                x_ticks: last,
                y_ticks: true,
                x_label: last,
                y_label: true,
                reduce_ticks: true,
            }
        })
        .collect();
    PanelGrid {
        rows: count,
        cols: 1,
        panels,
        shared_axis: Some(Axis::X),
        shared_color: false,
    }
}

fn pairwise_grid(count: usize, style: PairStyle) -> PanelGrid {
    let off_diagonal = match style {
        PairStyle::Hist => PanelKind::Density,
        PairStyle::Points => PanelKind::Scatter,
    };
    let mut panels = Vec::with_capacity(count * (count + 1) / 2);
    for row in 0..count {
        for col in 0..=row {
            let diagonal = row == col;
            let last_row = row == count - 1;
            panels.push(Panel {
                row,
                col,
                kind: if diagonal {
                    PanelKind::Histogram
                } else {
                    off_diagonal
                },
                x_param: Some(col),
                y_param: if diagonal { None } else { Some(row) },
                x_ticks: last_row,
                // The top-left histogram counts samples, not parameter values.
                y_ticks: col == 0 && row != 0,
                x_label: last_row,
                y_label: col == 0,
                reduce_ticks: true,
            });
        }
    }
    PanelGrid {
        rows: count,
        cols: count,
        panels,
        shared_axis: None,
        shared_color: style == PairStyle::Hist,
    }
}

fn histogram_grid(count: usize) -> PanelGrid {
    let (rows, cols) = histogram_shape(count);
    let panels = (0..count)
        .map(|i| Panel {
            row: i / cols,
            col: i % cols,
            kind: PanelKind::Histogram,
            x_param: Some(i),
            y_param: None,
            x_ticks: true,
            y_ticks: i % cols == 0,
            x_label: true,
            y_label: false,
            reduce_ticks: false,
        })
        .collect();
    PanelGrid {
        rows,
        cols,
        panels,
        shared_axis: Some(Axis::Y),
        shared_color: false,
    }
}

/// `(rows, columns)` of the marginal-histogram grid.
pub fn histogram_shape(count: usize) -> (usize, usize) {
    if count == 0 {
        return (0, 0);
    }
    let cols = if count > 9 {
        4
    } else if count > 4 {
        3
    } else {
        // 1 -> 1, 2 -> 2, 3 -> 3, 4 -> 2
        (count + 2) / 3 + (count + 2) % 3
    };
    let rows = (count + cols - 1) / cols;
    (rows, cols)
}

/// Thins an automatic tick set so labels stay readable: every third tick
/// when more than four would remain after taking every second one, every
/// second tick when more than two would remain, otherwise all of them.
pub fn reduce_ticks(ticks: &[f64]) -> Vec<f64> {
    let halved = (ticks.len() + 1) / 2;
    let step = if halved > 4 {
        3
    } else if halved > 2 {
        2
    } else {
        1
    };
    ticks.iter().step_by(step).copied().collect()
}

/// Round step of roughly `rough` size: 1, 2, 2.5 or 5 times a power of ten.
fn nice_step(rough: f64) -> f64 {
    let exp = rough.abs().log10().floor();
    let base = 10.0_f64.powf(exp);
    let frac = rough / base;
    let nice = if frac <= 1.0 {
        1.0
    } else if frac <= 2.0 {
        2.0
    } else if frac <= 2.5 {
        2.5
    } else if frac <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * base
}

/// Evenly spaced round tick positions inside `[lo, hi]`, at most `max_ticks`
/// intervals apart from the ends.
pub fn nice_ticks(lo: f64, hi: f64, max_ticks: usize) -> Vec<f64> {
    if !(lo.is_finite() && hi.is_finite()) || hi <= lo {
        return if lo.is_finite() { vec![lo] } else { Vec::new() };
    }
    let step = nice_step((hi - lo) / max_ticks.max(1) as f64);
    let first = (lo / step).ceil();
    let last = (hi / step).floor();
    let eps = 1e-9;
    let mut ticks = Vec::new();
    let mut k = first;
    while k <= last + eps {
        let v = k * step;
        // Snap values that should be exactly zero.
        ticks.push(if v.abs() < step * eps { 0.0 } else { v });
        k += 1.0;
    }
    ticks
}

/// Upper bound on automatic tick intervals per axis.
pub const AUTO_TICKS: usize = 8;

/// Automatic ticks for an axis spanning `[lo, hi]`, thinned when the panel
/// asks for it.
pub fn axis_ticks(lo: f64, hi: f64, reduce: bool) -> Vec<f64> {
    let ticks = nice_ticks(lo, hi, AUTO_TICKS);
    if reduce {
        reduce_ticks(&ticks)
    } else {
        ticks
    }
}

/// Log-axis ticks at the powers of ten inside `[lo, hi]`.
pub fn log_ticks(lo: f64, hi: f64) -> Vec<f64> {
    if !(lo > 0.0 && hi > lo) {
        return Vec::new();
    }
    let first = lo.log10().ceil() as i32;
    let last = hi.log10().floor() as i32;
    (first..=last).map(|e| 10.0_f64.powi(e)).collect()
}

/// Data limits with a 5% margin on either side, widened when the data
/// holds a single value.
pub fn padded_limits(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        let pad = 0.05 * (hi - lo);
        (lo - pad, hi + pad)
    } else {
        let pad = if lo != 0.0 { 0.05 * lo.abs() } else { 0.5 };
        (lo - pad, hi + pad)
    }
}

/// Offset of the outer axis labels in a pairwise grid, in panel fractions.
/// Farther out for bigger grids, where each panel is smaller.
pub fn pairwise_label_offset(count: usize) -> f64 {
    -0.155 * count as f64
}

/// Outer margins and inter-panel spacing of a figure, as figure fractions
/// (`hspace`/`wspace` as fractions of the panel height/width).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubplotAdjust {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
    pub hspace: f64,
    pub wspace: f64,
}

impl SubplotAdjust {
    /// Rectangle of the panel at `(row, col)` of a `rows` x `cols` grid, rows
    /// counted from the top.
    pub fn cell(&self, rows: usize, cols: usize, row: usize, col: usize) -> Rect {
        let rows_f = rows.max(1) as f64;
        let cols_f = cols.max(1) as f64;
        let cell_h = (self.top - self.bottom) / (rows_f + self.hspace * (rows_f - 1.0));
        let cell_w = (self.right - self.left) / (cols_f + self.wspace * (cols_f - 1.0));
        let bottom = self.top - (row as f64 + 1.0) * cell_h - row as f64 * self.hspace * cell_h;
        let left = self.left + col as f64 * cell_w * (1.0 + self.wspace);
        Rect::new(left, bottom, cell_w, cell_h)
    }
}
