//! The drawing capability every renderer calls into.
//!
//! A renderer owns the canvas for the whole of one call: it opens a figure
//! with [`Canvas::begin_figure`], draws into axes it creates, and releases the
//! figure with [`Canvas::save`] when an output path is configured.  Nothing is
//! shared between figures, so renderers can run back to back on one canvas.
//!
//! Coordinates: figure sizes are in inches, axes rectangles in figure
//! fractions with the origin at the bottom left, label positions in axes
//! fractions.  Data passed to drawing calls is in data units.
use crate::color::{Color, Colormap};
use crate::error::Result;
use crate::utils::{Histogram, Histogram2d};
use log::info;
use std::path::Path;

/// Handle of one set of axes inside the current figure.
pub type AxesId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, bottom: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            bottom,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn top(&self) -> f64 {
        self.bottom + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FigureSpec {
    pub width: f64,
    pub height: f64,
    pub title: Option<String>,
}

impl FigureSpec {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            title: None,
        }
    }

    pub fn with_title(mut self, title: Option<&str>) -> Self {
        self.title = title.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Linear,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Solid,
    Dashed,
    Dotted,
    /// Markers only.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Small dot.
    Point,
    /// Single pixel.
    Pixel,
    /// Filled circle sized by [`SeriesStyle::marker_size`].
    Circle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStyle {
    pub color: Color,
    pub line: LineKind,
    pub width: f64,
    pub marker: Option<Marker>,
    pub marker_size: f64,
    /// Legend entry; unlabeled series stay out of the legend.
    pub label: Option<String>,
}

impl SeriesStyle {
    pub fn line(color: Color, width: f64) -> Self {
        Self {
            color,
            line: LineKind::Solid,
            width,
            marker: None,
            marker_size: 0.0,
            label: None,
        }
    }

    pub fn markers(color: Color, marker: Marker, size: f64) -> Self {
        Self {
            color,
            line: LineKind::None,
            width: 0.0,
            marker: Some(marker),
            marker_size: size,
            label: None,
        }
    }

    pub fn dashed(mut self) -> Self {
        self.line = LineKind::Dashed;
        self
    }

    pub fn dotted(mut self) -> Self {
        self.line = LineKind::Dotted;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

/// How tick labels of one axis are shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickStyle {
    pub visible: bool,
    pub size: f64,
    /// Counter-clockwise label rotation in degrees.
    pub rotation: f64,
}

impl TickStyle {
    pub fn visible(size: f64) -> Self {
        Self {
            visible: true,
            size,
            rotation: 0.0,
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            size: 0.0,
            rotation: 0.0,
        }
    }

    pub fn rotated(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }
}

/// A 2D density normalized to its own peak.  Empty cells hold NaN so they
/// are drawn transparent rather than as zero density.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityImage {
    pub nx: usize,
    pub ny: usize,
    /// Row-major values, `values[iy * nx + ix]`, with `iy = 0` at the bottom.
    pub values: Vec<f64>,
    /// `(x_min, x_max, y_min, y_max)` in data units.
    pub extent: (f64, f64, f64, f64),
}

impl DensityImage {
    pub fn from_histogram2d(hist: &Histogram2d) -> Self {
        let nx = hist.counts.len();
        let ny = hist.counts.first().map_or(0, Vec::len);
        let peak = hist
            .counts
            .iter()
            .flat_map(|col| col.iter())
            .copied()
            .fold(0.0, f64::max);
        let mut values = vec![f64::NAN; nx * ny];
        for (ix, col) in hist.counts.iter().enumerate() {
            for (iy, &count) in col.iter().enumerate() {
                if count > 0.0 {
                    values[iy * nx + ix] = count / peak;
                }
            }
        }
        let (x_min, x_max) = edge_span(&hist.x_edges);
        let (y_min, y_max) = edge_span(&hist.y_edges);
        Self {
            nx,
            ny,
            values,
            extent: (x_min, x_max, y_min, y_max),
        }
    }

    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        self.values[iy * self.nx + ix]
    }
}

fn edge_span(edges: &[f64]) -> (f64, f64) {
    match (edges.first(), edges.last()) {
        (Some(&lo), Some(&hi)) => (lo, hi),
        _ => (0.0, 1.0),
    }
}

/// Backend that turns drawing calls into a figure on disk.
///
/// Every method returns `anyhow::Result` so backends can report any failure;
/// the renderers pass such failures on as [`crate::PlotError::Backend`].
pub trait Canvas {
    /// Opens a new figure, discarding whatever the previous one held.
    fn begin_figure(&mut self, figure: &FigureSpec) -> anyhow::Result<()>;

    fn add_axes(&mut self, rect: Rect) -> anyhow::Result<AxesId>;

    fn line_series(
        &mut self,
        axes: AxesId,
        xs: &[f64],
        ys: &[f64],
        style: &SeriesStyle,
    ) -> anyhow::Result<()>;

    /// Data points with symmetric vertical error bars drawn in `error_color`.
    fn error_bars(
        &mut self,
        axes: AxesId,
        xs: &[f64],
        ys: &[f64],
        errors: &[f64],
        style: &SeriesStyle,
        error_color: Color,
    ) -> anyhow::Result<()>;

    fn vertical_lines(
        &mut self,
        axes: AxesId,
        xs: &[f64],
        y_range: (f64, f64),
        style: &SeriesStyle,
    ) -> anyhow::Result<()>;

    /// Normalized density image; values below `lower_bound` or NaN use the
    /// colormap's under and bad colors, the top of the scale is 1.
    fn density_image(
        &mut self,
        axes: AxesId,
        image: &DensityImage,
        colormap: &Colormap,
        lower_bound: f64,
    ) -> anyhow::Result<()>;

    fn histogram(
        &mut self,
        axes: AxesId,
        hist: &Histogram,
        style: &SeriesStyle,
    ) -> anyhow::Result<()>;

    fn set_limits(&mut self, axes: AxesId, axis: Axis, lo: f64, hi: f64) -> anyhow::Result<()>;

    fn set_scale(&mut self, axes: AxesId, axis: Axis, scale: Scale) -> anyhow::Result<()>;

    fn set_ticks(
        &mut self,
        axes: AxesId,
        axis: Axis,
        ticks: &[f64],
        style: &TickStyle,
    ) -> anyhow::Result<()>;

    fn set_label(&mut self, axes: AxesId, axis: Axis, text: &str, size: f64)
        -> anyhow::Result<()>;

    /// Moves an axis label to `(x, y)` in axes fractions.
    fn set_label_coords(&mut self, axes: AxesId, axis: Axis, x: f64, y: f64)
        -> anyhow::Result<()>;

    fn set_title(&mut self, axes: AxesId, text: &str, size: f64) -> anyhow::Result<()>;

    /// Legend of the labeled series drawn so far on `axes`.
    fn legend(&mut self, axes: AxesId) -> anyhow::Result<()>;

    /// Colorbar independent of any axes, with one color band between each
    /// pair of consecutive `bounds`.
    fn colorbar(
        &mut self,
        rect: Rect,
        colormap: &Colormap,
        bounds: &[f64],
        ticks: &[f64],
        label: &str,
    ) -> anyhow::Result<()>;

    /// Persists the figure; the format follows the path's extension.
    fn save(&mut self, path: &Path) -> anyhow::Result<()>;
}

/// Saves the current figure when a path is given.
pub(crate) fn finish(canvas: &mut dyn Canvas, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        canvas.save(path)?;
        info!("saved figure to {}", path.display());
    }
    Ok(())
}
