//! In-memory [`Canvas`] that records every call, for asserting on what the
//! renderers draw.
use crate::canvas::{
    AxesId, Axis, Canvas, DensityImage, FigureSpec, Rect, Scale, SeriesStyle, TickStyle,
};
use crate::color::{Color, Colormap};
use crate::utils::Histogram;
use anyhow::anyhow;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Begin(FigureSpec),
    AddAxes(Rect),
    Line {
        axes: AxesId,
        xs: Vec<f64>,
        ys: Vec<f64>,
        style: SeriesStyle,
    },
    ErrorBars {
        axes: AxesId,
        xs: Vec<f64>,
        ys: Vec<f64>,
        errors: Vec<f64>,
    },
    VLines {
        axes: AxesId,
        xs: Vec<f64>,
        y_range: (f64, f64),
    },
    Density {
        axes: AxesId,
        image: DensityImage,
        lower_bound: f64,
    },
    Hist {
        axes: AxesId,
        hist: Histogram,
    },
    Limits {
        axes: AxesId,
        axis: Axis,
        lo: f64,
        hi: f64,
    },
    Scale {
        axes: AxesId,
        axis: Axis,
        scale: Scale,
    },
    Ticks {
        axes: AxesId,
        axis: Axis,
        ticks: Vec<f64>,
        style: TickStyle,
    },
    Label {
        axes: AxesId,
        axis: Axis,
        text: String,
    },
    LabelCoords {
        axes: AxesId,
        axis: Axis,
        x: f64,
        y: f64,
    },
    Title {
        axes: AxesId,
        text: String,
    },
    Legend(AxesId),
    Colorbar {
        rect: Rect,
        bounds: Vec<f64>,
        ticks: Vec<f64>,
        label: String,
    },
    Save(PathBuf),
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub ops: Vec<Op>,
    axes: usize,
    /// Fail every call once this many calls have been recorded.
    pub fail_after: Option<usize>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, op: Op) -> anyhow::Result<()> {
        if let Some(limit) = self.fail_after {
            if self.ops.len() >= limit {
                return Err(anyhow!("recorder refused call {}", self.ops.len()));
            }
        }
        self.ops.push(op);
        Ok(())
    }

    pub fn figures(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Begin(_))).count()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|&op| pred(op)).count()
    }

    pub fn saved(&self) -> Vec<PathBuf> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Save(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last limits set on `axis` of `axes`.
    pub fn limits(&self, axes: AxesId, axis: Axis) -> Option<(f64, f64)> {
        self.ops.iter().rev().find_map(|op| match op {
            Op::Limits {
                axes: a,
                axis: x,
                lo,
                hi,
            } if *a == axes && *x == axis => Some((*lo, *hi)),
            _ => None,
        })
    }

    /// Last ticks set on `axis` of `axes`.
    pub fn ticks(&self, axes: AxesId, axis: Axis) -> Option<(Vec<f64>, TickStyle)> {
        self.ops.iter().rev().find_map(|op| match op {
            Op::Ticks {
                axes: a,
                axis: x,
                ticks,
                style,
            } if *a == axes && *x == axis => {
                Some((ticks.clone(), *style))
            }
            _ => None,
        })
    }

    pub fn labels(&self, axis: Axis) -> Vec<(AxesId, String)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Label { axes, axis: x, text } if *x == axis => Some((*axes, text.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for Recorder {
    fn begin_figure(&mut self, figure: &FigureSpec) -> anyhow::Result<()> {
        self.axes = 0;
        self.record(Op::Begin(figure.clone()))
    }

    fn add_axes(&mut self, rect: Rect) -> anyhow::Result<AxesId> {
        self.record(Op::AddAxes(rect))?;
        self.axes += 1;
        Ok(self.axes - 1)
    }

    fn line_series(
        &mut self,
        axes: AxesId,
        xs: &[f64],
        ys: &[f64],
        style: &SeriesStyle,
    ) -> anyhow::Result<()> {
        self.record(Op::Line {
            axes,
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            style: style.clone(),
        })
    }

    fn error_bars(
        &mut self,
        axes: AxesId,
        xs: &[f64],
        ys: &[f64],
        errors: &[f64],
        _style: &SeriesStyle,
        _error_color: Color,
    ) -> anyhow::Result<()> {
        self.record(Op::ErrorBars {
            axes,
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            errors: errors.to_vec(),
        })
    }

    fn vertical_lines(
        &mut self,
        axes: AxesId,
        xs: &[f64],
        y_range: (f64, f64),
        _style: &SeriesStyle,
    ) -> anyhow::Result<()> {
        self.record(Op::VLines {
            axes,
            xs: xs.to_vec(),
            y_range,
        })
    }

    fn density_image(
        &mut self,
        axes: AxesId,
        image: &DensityImage,
        _colormap: &Colormap,
        lower_bound: f64,
    ) -> anyhow::Result<()> {
        self.record(Op::Density {
            axes,
            image: image.clone(),
            lower_bound,
        })
    }

    fn histogram(
        &mut self,
        axes: AxesId,
        hist: &Histogram,
        _style: &SeriesStyle,
    ) -> anyhow::Result<()> {
        self.record(Op::Hist {
            axes,
            hist: hist.clone(),
        })
    }

    fn set_limits(&mut self, axes: AxesId, axis: Axis, lo: f64, hi: f64) -> anyhow::Result<()> {
        self.record(Op::Limits { axes, axis, lo, hi })
    }

    fn set_scale(&mut self, axes: AxesId, axis: Axis, scale: Scale) -> anyhow::Result<()> {
        self.record(Op::Scale { axes, axis, scale })
    }

    fn set_ticks(
        &mut self,
        axes: AxesId,
        axis: Axis,
        ticks: &[f64],
        style: &TickStyle,
    ) -> anyhow::Result<()> {
        self.record(Op::Ticks {
            axes,
            axis,
            ticks: ticks.to_vec(),
            style: *style,
        })
    }

    fn set_label(
        &mut self,
        axes: AxesId,
        axis: Axis,
        text: &str,
        _size: f64,
    ) -> anyhow::Result<()> {
        self.record(Op::Label {
            axes,
            axis,
            text: text.to_string(),
        })
    }

    fn set_label_coords(&mut self, axes: AxesId, axis: Axis, x: f64, y: f64) -> anyhow::Result<()> {
        self.record(Op::LabelCoords { axes, axis, x, y })
    }

    fn set_title(&mut self, axes: AxesId, text: &str, _size: f64) -> anyhow::Result<()> {
        self.record(Op::Title {
            axes,
            text: text.to_string(),
        })
    }

    fn legend(&mut self, axes: AxesId) -> anyhow::Result<()> {
        self.record(Op::Legend(axes))
    }

    fn colorbar(
        &mut self,
        rect: Rect,
        _colormap: &Colormap,
        bounds: &[f64],
        ticks: &[f64],
        label: &str,
    ) -> anyhow::Result<()> {
        self.record(Op::Colorbar {
            rect,
            bounds: bounds.to_vec(),
            ticks: ticks.to_vec(),
            label: label.to_string(),
        })
    }

    fn save(&mut self, path: &Path) -> anyhow::Result<()> {
        self.record(Op::Save(path.to_path_buf()))
    }
}
