//! Self-contained SVG implementation of [`Canvas`].
//!
//! Drawing calls only record data-space primitives per axes; pixel geometry
//! is resolved when the figure is rendered, so limits, scales and ticks may
//! be set after the data has been drawn.
use crate::canvas::{
    AxesId, Axis, Canvas, DensityImage, FigureSpec, LineKind, Marker, Rect, Scale, SeriesStyle,
    TickStyle,
};
use crate::color::{Color, Colormap, BLACK, WHITE};
use crate::layout::{log_ticks, nice_ticks, padded_limits, AUTO_TICKS};
use crate::utils::{extent, Histogram};
use anyhow::{anyhow, bail, Context};
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

/// Output units are points.
const POINTS_PER_INCH: f64 = 72.0;
const TICK_LEN: f64 = 3.5;
const DEFAULT_TICK_SIZE: f64 = 10.0;
const SUPTITLE_SIZE: f64 = 16.0;
const LEGEND_SIZE: f64 = 10.0;
const COLORBAR_LABEL_SIZE: f64 = 12.0;
/// Rough advance of one glyph, as a fraction of the font size.
const GLYPH_WIDTH: f64 = 0.6;
const FONT_FAMILY: &str = "DejaVu Sans, Arial, sans-serif";

#[derive(Debug, Clone)]
enum Item {
    Series {
        xs: Vec<f64>,
        ys: Vec<f64>,
        style: SeriesStyle,
    },
    ErrorBars {
        xs: Vec<f64>,
        ys: Vec<f64>,
        errors: Vec<f64>,
        style: SeriesStyle,
        error_color: Color,
    },
    VLines {
        xs: Vec<f64>,
        y_range: (f64, f64),
        style: SeriesStyle,
    },
    Density {
        image: DensityImage,
        colormap: Colormap,
        lower_bound: f64,
    },
    Hist {
        hist: Histogram,
        style: SeriesStyle,
    },
}

impl Item {
    /// Appends the data values this item spans along `axis`.
    fn extend_values(&self, axis: Axis, out: &mut Vec<f64>) {
        match (self, axis) {
            (Item::Series { xs, .. }, Axis::X)
            | (Item::ErrorBars { xs, .. }, Axis::X)
            | (Item::VLines { xs, .. }, Axis::X) => out.extend_from_slice(xs),
            (Item::Series { ys, .. }, Axis::Y) => out.extend_from_slice(ys),
            (Item::ErrorBars { ys, errors, .. }, Axis::Y) => {
                for (y, e) in ys.iter().zip(errors) {
                    out.push(y - e);
                    out.push(y + e);
                }
            }
            (Item::VLines { y_range, .. }, Axis::Y) => {
                out.extend_from_slice(&[y_range.0, y_range.1])
            }
            (Item::Density { image, .. }, Axis::X) => {
                out.extend_from_slice(&[image.extent.0, image.extent.1])
            }
            (Item::Density { image, .. }, Axis::Y) => {
                out.extend_from_slice(&[image.extent.2, image.extent.3])
            }
            (Item::Hist { hist, .. }, Axis::X) => out.extend_from_slice(&hist.edges),
            (Item::Hist { hist, .. }, Axis::Y) => out.extend_from_slice(&[0.0, hist.max_count()]),
        }
    }

    fn legend_entry(&self) -> Option<(&str, &SeriesStyle)> {
        match self {
            Item::Series { style, .. } | Item::ErrorBars { style, .. } => {
                style.label.as_deref().map(|label| (label, style))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct AxisState {
    limits: Option<(f64, f64)>,
    scale: Scale,
    ticks: Option<(Vec<f64>, TickStyle)>,
    label: Option<(String, f64)>,
    label_coords: Option<(f64, f64)>,
}

impl Default for AxisState {
    fn default() -> Self {
        Self {
            limits: None,
            scale: Scale::Linear,
            ticks: None,
            label: None,
            label_coords: None,
        }
    }
}

#[derive(Debug, Clone)]
struct AxesState {
    rect: Rect,
    items: Vec<Item>,
    x: AxisState,
    y: AxisState,
    title: Option<(String, f64)>,
    legend: bool,
}

impl AxesState {
    fn new(rect: Rect) -> Self {
        Self {
            rect,
            items: Vec::new(),
            x: AxisState::default(),
            y: AxisState::default(),
            title: None,
            legend: false,
        }
    }

    fn axis(&self, axis: Axis) -> &AxisState {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut AxisState {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }

    /// Data range along `axis`: the explicit limits, or the drawn data with
    /// a margin.
    fn range(&self, axis: Axis) -> (f64, f64) {
        let state = self.axis(axis);
        if let Some(limits) = state.limits {
            return limits;
        }
        let mut values = Vec::new();
        for item in &self.items {
            item.extend_values(axis, &mut values);
        }
        match state.scale {
            Scale::Linear => extent(&values).map_or((0.0, 1.0), |(lo, hi)| padded_limits(lo, hi)),
            Scale::Log => {
                values.retain(|v| *v > 0.0);
                match extent(&values) {
                    Some((lo, hi)) if hi > lo => (lo, hi),
                    Some((v, _)) => (v / 10.0, v * 10.0),
                    None => (1.0, 10.0),
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct ColorbarState {
    rect: Rect,
    colormap: Colormap,
    bounds: Vec<f64>,
    ticks: Vec<f64>,
    label: String,
}

/// Pixel placement of one axes and the data ranges it shows.
struct Frame {
    x0: f64,
    y0: f64,
    w: f64,
    h: f64,
    x_range: (f64, f64),
    y_range: (f64, f64),
    x_log: bool,
    y_log: bool,
}

impl Frame {
    fn new(axes: &AxesState, fig_w: f64, fig_h: f64) -> Self {
        Self {
            x0: axes.rect.left * fig_w,
            y0: (1.0 - axes.rect.top()) * fig_h,
            w: axes.rect.width * fig_w,
            h: axes.rect.height * fig_h,
            x_range: axes.range(Axis::X),
            y_range: axes.range(Axis::Y),
            x_log: axes.x.scale == Scale::Log,
            y_log: axes.y.scale == Scale::Log,
        }
    }

    /// Position of `v` along a range, 0 at the low end and 1 at the high one.
    fn fraction(v: f64, (lo, hi): (f64, f64), log: bool) -> Option<f64> {
        if !v.is_finite() {
            return None;
        }
        let t = if log {
            if v <= 0.0 || lo <= 0.0 || hi <= 0.0 {
                return None;
            }
            (v.log10() - lo.log10()) / (hi.log10() - lo.log10())
        } else {
            (v - lo) / (hi - lo)
        };
        if t.is_finite() {
            Some(t)
        } else {
            None
        }
    }

    fn px(&self, x: f64) -> Option<f64> {
        Self::fraction(x, self.x_range, self.x_log).map(|t| self.x0 + t * self.w)
    }

    fn py(&self, y: f64) -> Option<f64> {
        Self::fraction(y, self.y_range, self.y_log).map(|t| self.y0 + self.h - t * self.h)
    }

    fn point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        Some((self.px(x)?, self.py(y)?))
    }

    /// Pixel position of a point given in axes fractions.
    fn at_fraction(&self, fx: f64, fy: f64) -> (f64, f64) {
        (self.x0 + fx * self.w, self.y0 + self.h - fy * self.h)
    }
}

/// Deferred-rendering SVG backend.  Only `.svg` output paths are accepted.
#[derive(Debug, Default)]
pub struct SvgCanvas {
    figure: Option<FigureSpec>,
    axes: Vec<AxesState>,
    colorbars: Vec<ColorbarState>,
}

impl SvgCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    fn axes_mut(&mut self, id: AxesId) -> anyhow::Result<&mut AxesState> {
        self.axes
            .get_mut(id)
            .ok_or_else(|| anyhow!("no axes with id {} in the current figure", id))
    }

    fn push(&mut self, id: AxesId, item: Item) -> anyhow::Result<()> {
        self.axes_mut(id)?.items.push(item);
        Ok(())
    }

    /// The current figure as an SVG document.
    pub fn to_svg(&self) -> anyhow::Result<String> {
        let figure = self
            .figure
            .as_ref()
            .ok_or_else(|| anyhow!("no figure to render"))?;
        let mut out = String::with_capacity(32 * 1024);
        self.render(figure, &mut out)?;
        Ok(out)
    }

    fn render(&self, figure: &FigureSpec, out: &mut String) -> fmt::Result {
        let fig_w = figure.width * POINTS_PER_INCH;
        let fig_h = figure.height * POINTS_PER_INCH;
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}pt" height="{:.0}pt" viewBox="0 0 {:.2} {:.2}">"#,
            fig_w, fig_h, fig_w, fig_h
        )?;

        if !self.axes.is_empty() {
            out.push_str("<defs>\n");
            for (i, axes) in self.axes.iter().enumerate() {
                let frame = Frame::new(axes, fig_w, fig_h);
                writeln!(
                    out,
                    r#"<clipPath id="axes{}"><rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" /></clipPath>"#,
                    i, frame.x0, frame.y0, frame.w, frame.h
                )?;
            }
            out.push_str("</defs>\n");
        }
        writeln!(
            out,
            r#"<rect width="{:.2}" height="{:.2}" fill="{}" />"#,
            fig_w,
            fig_h,
            WHITE.to_svg_fill()
        )?;

        for (i, axes) in self.axes.iter().enumerate() {
            render_axes(out, i, axes, fig_w, fig_h)?;
        }
        for bar in &self.colorbars {
            render_colorbar(out, bar, fig_w, fig_h)?;
        }
        if let Some(title) = &figure.title {
            text(
                out,
                fig_w / 2.0,
                0.04 * fig_h,
                title,
                SUPTITLE_SIZE,
                "middle",
                0.0,
            )?;
        }
        out.push_str("</svg>\n");
        Ok(())
    }
}

impl Canvas for SvgCanvas {
    fn begin_figure(&mut self, figure: &FigureSpec) -> anyhow::Result<()> {
        if !(figure.width > 0.0 && figure.height > 0.0) {
            bail!(
                "figure size must be positive, got {} x {}",
                figure.width,
                figure.height
            );
        }
        self.figure = Some(figure.clone());
        self.axes.clear();
        self.colorbars.clear();
        Ok(())
    }

    fn add_axes(&mut self, rect: Rect) -> anyhow::Result<AxesId> {
        if self.figure.is_none() {
            bail!("axes added before any figure was opened");
        }
        self.axes.push(AxesState::new(rect));
        Ok(self.axes.len() - 1)
    }

    fn line_series(
        &mut self,
        axes: AxesId,
        xs: &[f64],
        ys: &[f64],
        style: &SeriesStyle,
    ) -> anyhow::Result<()> {
        self.push(
            axes,
            Item::Series {
                xs: xs.to_vec(),
                ys: ys.to_vec(),
                style: style.clone(),
            },
        )
    }

    fn error_bars(
        &mut self,
        axes: AxesId,
        xs: &[f64],
        ys: &[f64],
        errors: &[f64],
        style: &SeriesStyle,
        error_color: Color,
    ) -> anyhow::Result<()> {
        self.push(
            axes,
            Item::ErrorBars {
                xs: xs.to_vec(),
                ys: ys.to_vec(),
                errors: errors.to_vec(),
                style: style.clone(),
                error_color,
            },
        )
    }

    fn vertical_lines(
        &mut self,
        axes: AxesId,
        xs: &[f64],
        y_range: (f64, f64),
        style: &SeriesStyle,
    ) -> anyhow::Result<()> {
        self.push(
            axes,
            Item::VLines {
                xs: xs.to_vec(),
                y_range,
                style: style.clone(),
            },
        )
    }

    fn density_image(
        &mut self,
        axes: AxesId,
        image: &DensityImage,
        colormap: &Colormap,
        lower_bound: f64,
    ) -> anyhow::Result<()> {
        if image.values.len() != image.nx * image.ny {
            bail!(
                "density image holds {} values for a {} x {} grid",
                image.values.len(),
                image.nx,
                image.ny
            );
        }
        self.push(
            axes,
            Item::Density {
                image: image.clone(),
                colormap: colormap.clone(),
                lower_bound,
            },
        )
    }

    fn histogram(
        &mut self,
        axes: AxesId,
        hist: &Histogram,
        style: &SeriesStyle,
    ) -> anyhow::Result<()> {
        if hist.edges.len() != hist.counts.len() + 1 {
            bail!(
                "histogram has {} edges for {} bins",
                hist.edges.len(),
                hist.counts.len()
            );
        }
        self.push(
            axes,
            Item::Hist {
                hist: hist.clone(),
                style: style.clone(),
            },
        )
    }

    fn set_limits(&mut self, axes: AxesId, axis: Axis, lo: f64, hi: f64) -> anyhow::Result<()> {
        self.axes_mut(axes)?.axis_mut(axis).limits = Some((lo, hi));
        Ok(())
    }

    fn set_scale(&mut self, axes: AxesId, axis: Axis, scale: Scale) -> anyhow::Result<()> {
        self.axes_mut(axes)?.axis_mut(axis).scale = scale;
        Ok(())
    }

    fn set_ticks(
        &mut self,
        axes: AxesId,
        axis: Axis,
        ticks: &[f64],
        style: &TickStyle,
    ) -> anyhow::Result<()> {
        self.axes_mut(axes)?.axis_mut(axis).ticks = Some((ticks.to_vec(), *style));
        Ok(())
    }

    fn set_label(&mut self, axes: AxesId, axis: Axis, text: &str, size: f64) -> anyhow::Result<()> {
        self.axes_mut(axes)?.axis_mut(axis).label = Some((text.to_string(), size));
        Ok(())
    }

    fn set_label_coords(&mut self, axes: AxesId, axis: Axis, x: f64, y: f64) -> anyhow::Result<()> {
        self.axes_mut(axes)?.axis_mut(axis).label_coords = Some((x, y));
        Ok(())
    }

    fn set_title(&mut self, axes: AxesId, text: &str, size: f64) -> anyhow::Result<()> {
        self.axes_mut(axes)?.title = Some((text.to_string(), size));
        Ok(())
    }

    fn legend(&mut self, axes: AxesId) -> anyhow::Result<()> {
        self.axes_mut(axes)?.legend = true;
        Ok(())
    }

    fn colorbar(
        &mut self,
        rect: Rect,
        colormap: &Colormap,
        bounds: &[f64],
        ticks: &[f64],
        label: &str,
    ) -> anyhow::Result<()> {
        if self.figure.is_none() {
            bail!("colorbar added before any figure was opened");
        }
        self.colorbars.push(ColorbarState {
            rect,
            colormap: colormap.clone(),
            bounds: bounds.to_vec(),
            ticks: ticks.to_vec(),
            label: label.to_string(),
        });
        Ok(())
    }

    fn save(&mut self, path: &Path) -> anyhow::Result<()> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if ext.as_deref() != Some("svg") {
            bail!(
                "cannot save {}: only .svg output is supported",
                path.display()
            );
        }
        let svg = self.to_svg()?;
        fs::write(path, svg).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

fn render_axes(
    out: &mut String,
    id: usize,
    axes: &AxesState,
    fig_w: f64,
    fig_h: f64,
) -> fmt::Result {
    let frame = Frame::new(axes, fig_w, fig_h);
    writeln!(out, r#"<g clip-path="url(#axes{})">"#, id)?;
    for item in &axes.items {
        render_item(out, &frame, item)?;
    }
    out.push_str("</g>\n");
    writeln!(
        out,
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="{}" stroke-width="0.8" />"#,
        frame.x0,
        frame.y0,
        frame.w,
        frame.h,
        BLACK.to_svg_fill()
    )?;

    let x_extent = render_ticks(out, &frame, &axes.x, Axis::X)?;
    let y_extent = render_ticks(out, &frame, &axes.y, Axis::Y)?;
    if let Some((label, size)) = &axes.x.label {
        let (x, y) = match axes.x.label_coords {
            Some((fx, fy)) => frame.at_fraction(fx, fy),
            None => (
                frame.x0 + frame.w / 2.0,
                frame.y0 + frame.h + x_extent + 0.9 * size,
            ),
        };
        text(out, x, y, label, *size, "middle", 0.0)?;
    }
    if let Some((label, size)) = &axes.y.label {
        let (x, y) = match axes.y.label_coords {
            Some((fx, fy)) => frame.at_fraction(fx, fy),
            None => (frame.x0 - y_extent - 0.9 * size, frame.y0 + frame.h / 2.0),
        };
        text(out, x, y, label, *size, "middle", 90.0)?;
    }
    if let Some((title, size)) = &axes.title {
        let (x, y) = (frame.x0 + frame.w / 2.0, frame.y0 - 0.8 * size);
        text(out, x, y, title, *size, "middle", 0.0)?;
    }
    if axes.legend {
        render_legend(out, &frame, axes)?;
    }
    Ok(())
}

fn render_item(out: &mut String, frame: &Frame, item: &Item) -> fmt::Result {
    match item {
        Item::Series { xs, ys, style } => render_series(out, frame, xs, ys, style),
        Item::ErrorBars {
            xs,
            ys,
            errors,
            style,
            error_color,
        } => {
            for ((&x, &y), &e) in xs.iter().zip(ys).zip(errors) {
                let ends = (frame.px(x), frame.py(y - e), frame.py(y + e));
                if let (Some(px), Some(lo), Some(hi)) = ends {
                    line(out, (px, lo), (px, hi), *error_color, 1.0, LineKind::Solid)?;
                }
            }
            render_series(out, frame, xs, ys, style)
        }
        Item::VLines { xs, y_range, style } => {
            for &x in xs {
                let ends = (frame.px(x), frame.py(y_range.0), frame.py(y_range.1));
                if let (Some(px), Some(a), Some(b)) = ends {
                    let width = style.width.max(0.5);
                    line(out, (px, a), (px, b), style.color, width, style.line)?;
                }
            }
            Ok(())
        }
        Item::Density {
            image,
            colormap,
            lower_bound,
        } => {
            let (x_min, x_max, y_min, y_max) = image.extent;
            let dx = (x_max - x_min) / image.nx.max(1) as f64;
            let dy = (y_max - y_min) / image.ny.max(1) as f64;
            for iy in 0..image.ny {
                for ix in 0..image.nx {
                    let color = colormap.map(image.get(ix, iy), *lower_bound, 1.0);
                    if color.is_transparent() {
                        continue;
                    }
                    let corners = (
                        frame.point(x_min + ix as f64 * dx, y_min + (iy + 1) as f64 * dy),
                        frame.point(x_min + (ix + 1) as f64 * dx, y_min + iy as f64 * dy),
                    );
                    if let (Some((left, top)), Some((right, bottom))) = corners {
                        filled_rect(out, left, top, right - left, bottom - top, color)?;
                    }
                }
            }
            Ok(())
        }
        Item::Hist { hist, style } => {
            for (i, &count) in hist.counts.iter().enumerate() {
                if count <= 0.0 {
                    continue;
                }
                let corners = (
                    frame.point(hist.edges[i], count),
                    frame.point(hist.edges[i + 1], 0.0),
                );
                if let (Some((left, top)), Some((right, bottom))) = corners {
                    filled_rect(out, left, top, right - left, bottom - top, style.color)?;
                }
            }
            Ok(())
        }
    }
}

fn render_series(
    out: &mut String,
    frame: &Frame,
    xs: &[f64],
    ys: &[f64],
    style: &SeriesStyle,
) -> fmt::Result {
    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(&x, &y)| frame.point(x, y))
        .collect();
    if style.line != LineKind::None && points.len() > 1 {
        out.push_str(r#"<polyline points=""#);
        for (i, (x, y)) in points.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            write!(out, "{:.2},{:.2}", x, y)?;
        }
        out.push('"');
        write!(out, r#" fill="none""#)?;
        write_stroke(out, style.color, style.width, style.line)?;
        out.push_str(" />\n");
    }
    if let Some(marker) = style.marker {
        for &(x, y) in &points {
            match marker {
                Marker::Pixel => filled_rect(out, x - 0.5, y - 0.5, 1.0, 1.0, style.color)?,
                Marker::Point | Marker::Circle => writeln!(
                    out,
                    r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" />"#,
                    x,
                    y,
                    (style.marker_size / 2.0).max(0.5),
                    style.color.to_svg_fill()
                )?,
            }
        }
    }
    Ok(())
}

/// Draws tick marks and labels along one side of the frame.  Returns how far
/// the labels reach out from the frame, in points.
fn render_ticks(
    out: &mut String,
    frame: &Frame,
    state: &AxisState,
    axis: Axis,
) -> Result<f64, fmt::Error> {
    let (lo, hi) = match axis {
        Axis::X => frame.x_range,
        Axis::Y => frame.y_range,
    };
    let log = state.scale == Scale::Log;
    let (ticks, style) = match &state.ticks {
        Some((ticks, style)) => (ticks.clone(), *style),
        None => {
            let (lo, hi) = (lo.min(hi), hi.max(lo));
            let ticks = if log {
                log_ticks(lo, hi)
            } else {
                nice_ticks(lo, hi, AUTO_TICKS)
            };
            (ticks, TickStyle::visible(DEFAULT_TICK_SIZE))
        }
    };
    let step = tick_step(&ticks);
    let mut reach = TICK_LEN;
    for &t in &ticks {
        let label = if log { format_log_tick(t) } else { format_tick(t, step) };
        let label_len = label.chars().count() as f64 * GLYPH_WIDTH * style.size;
        match axis {
            Axis::X => {
                let px = match frame.px(t) {
                    Some(px) if px >= frame.x0 - 0.5 && px <= frame.x0 + frame.w + 0.5 => px,
                    _ => continue,
                };
                let y = frame.y0 + frame.h;
                line(
                    out,
                    (px, y),
                    (px, y + TICK_LEN),
                    BLACK,
                    0.8,
                    LineKind::Solid,
                )?;
                if style.visible {
                    let size = style.size;
                    if style.rotation != 0.0 {
                        let ty = y + TICK_LEN + 2.0;
                        text(out, px, ty, &label, size, "end", style.rotation)?;
                        reach = reach.max(TICK_LEN + 2.0 + label_len);
                    } else {
                        let ty = y + TICK_LEN + 0.8 * size;
                        text(out, px, ty, &label, size, "middle", 0.0)?;
                        reach = reach.max(TICK_LEN + 1.4 * size);
                    }
                }
            }
            Axis::Y => {
                let py = match frame.py(t) {
                    Some(py) if py >= frame.y0 - 0.5 && py <= frame.y0 + frame.h + 0.5 => py,
                    _ => continue,
                };
                line(
                    out,
                    (frame.x0 - TICK_LEN, py),
                    (frame.x0, py),
                    BLACK,
                    0.8,
                    LineKind::Solid,
                )?;
                if style.visible {
                    let tx = frame.x0 - TICK_LEN - 2.0;
                    text(out, tx, py, &label, style.size, "end", style.rotation)?;
                    reach = reach.max(TICK_LEN + 2.0 + label_len);
                }
            }
        }
    }
    Ok(reach)
}

fn render_legend(out: &mut String, frame: &Frame, axes: &AxesState) -> fmt::Result {
    let entries: Vec<(&str, &SeriesStyle)> =
        axes.items.iter().filter_map(Item::legend_entry).collect();
    if entries.is_empty() {
        return Ok(());
    }
    let longest = entries
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0) as f64;
    let row = 1.5 * LEGEND_SIZE;
    let width = 30.0 + longest * GLYPH_WIDTH * LEGEND_SIZE + 8.0;
    let height = row * entries.len() as f64 + 6.0;
    let x = frame.x0 + frame.w - width - 8.0;
    let y = frame.y0 + 8.0;
    writeln!(
        out,
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" stroke="{}" stroke-width="0.5" opacity="0.8" />"#,
        x,
        y,
        width,
        height,
        WHITE.to_svg_fill(),
        Color::grey(0.8).to_svg_fill()
    )?;
    for (i, (label, style)) in entries.iter().enumerate() {
        let cy = y + 3.0 + row * (i as f64 + 0.5);
        if style.line != LineKind::None {
            let width = style.width.max(1.0);
            line(
                out,
                (x + 6.0, cy),
                (x + 24.0, cy),
                style.color,
                width,
                style.line,
            )?;
        }
        if style.marker.is_some() {
            writeln!(
                out,
                r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" />"#,
                x + 15.0,
                cy,
                (style.marker_size / 2.0).max(1.5),
                style.color.to_svg_fill()
            )?;
        }
        text(out, x + 30.0, cy, label, LEGEND_SIZE, "start", 0.0)?;
    }
    Ok(())
}

fn render_colorbar(out: &mut String, bar: &ColorbarState, fig_w: f64, fig_h: f64) -> fmt::Result {
    let (lo, hi) = match (bar.bounds.first(), bar.bounds.last()) {
        (Some(&lo), Some(&hi)) if hi > lo => (lo, hi),
        _ => return Ok(()),
    };
    let x0 = bar.rect.left * fig_w;
    let y0 = (1.0 - bar.rect.top()) * fig_h;
    let w = bar.rect.width * fig_w;
    let h = bar.rect.height * fig_h;
    let to_y = |v: f64| y0 + h - (v - lo) / (hi - lo) * h;

    for band in bar.bounds.windows(2) {
        let color = bar.colormap.map(0.5 * (band[0] + band[1]), lo, hi);
        let top = to_y(band[1]);
        // Overlap neighbours slightly so no seams show between bands.
        filled_rect(out, x0, top, w, to_y(band[0]) - top + 0.3, color)?;
    }
    writeln!(
        out,
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="{}" stroke-width="0.8" />"#,
        x0,
        y0,
        w,
        h,
        BLACK.to_svg_fill()
    )?;

    let step = tick_step(&bar.ticks);
    let mut reach: f64 = 0.0;
    for &t in &bar.ticks {
        if t < lo || t > hi {
            continue;
        }
        let y = to_y(t);
        line(
            out,
            (x0 + w, y),
            (x0 + w + TICK_LEN, y),
            BLACK,
            0.8,
            LineKind::Solid,
        )?;
        let label = format_tick(t, step);
        text(
            out,
            x0 + w + TICK_LEN + 2.0,
            y,
            &label,
            DEFAULT_TICK_SIZE,
            "start",
            0.0,
        )?;
        reach = reach.max(label.chars().count() as f64 * GLYPH_WIDTH * DEFAULT_TICK_SIZE);
    }
    let label_x = x0 + w + TICK_LEN + 2.0 + reach + COLORBAR_LABEL_SIZE;
    text(
        out,
        label_x,
        y0 + h / 2.0,
        &bar.label,
        COLORBAR_LABEL_SIZE,
        "middle",
        90.0,
    )
}

fn write_stroke(out: &mut String, color: Color, width: f64, kind: LineKind) -> fmt::Result {
    write!(out, r#" stroke="{}" stroke-width="{:.2}""#, color.to_svg_fill(), width)?;
    match kind {
        LineKind::Dashed => write!(out, r#" stroke-dasharray="6,4""#),
        LineKind::Dotted => write!(out, r#" stroke-dasharray="1.5,3""#),
        LineKind::Solid | LineKind::None => Ok(()),
    }
}

fn line(
    out: &mut String,
    from: (f64, f64),
    to: (f64, f64),
    color: Color,
    width: f64,
    kind: LineKind,
) -> fmt::Result {
    write!(
        out,
        r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}""#,
        from.0, from.1, to.0, to.1
    )?;
    write_stroke(out, color, width, kind)?;
    out.push_str(" />\n");
    Ok(())
}

fn filled_rect(out: &mut String, x: f64, y: f64, w: f64, h: f64, color: Color) -> fmt::Result {
    writeln!(
        out,
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" />"#,
        x,
        y,
        w,
        h,
        color.to_svg_fill()
    )
}

/// Text centred vertically on `y`; `rotation` is counter-clockwise in degrees.
fn text(
    out: &mut String,
    x: f64,
    y: f64,
    content: &str,
    size: f64,
    anchor: &str,
    rotation: f64,
) -> fmt::Result {
    write!(
        out,
        r#"<text x="{:.2}" y="{:.2}" font-family="{}" font-size="{:.1}" text-anchor="{}" dominant-baseline="middle""#,
        x, y, FONT_FAMILY, size, anchor
    )?;
    if rotation != 0.0 {
        write!(out, r#" transform="rotate({:.1},{:.2},{:.2})""#, -rotation, x, y)?;
    }
    out.push('>');
    out.push_str(&escape_xml(content));
    out.push_str("</text>\n");
    Ok(())
}

fn escape_xml(content: &str) -> String {
    let mut escaped = String::with_capacity(content.len());
    for ch in content.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn tick_step(ticks: &[f64]) -> f64 {
    match ticks {
        [a, b, ..] if b > a => b - a,
        _ => 1.0,
    }
}

/// Decimals needed to write multiples of `step` exactly.
fn decimals(step: f64) -> usize {
    (0..10)
        .find(|&d| {
            let scaled = step * 10_f64.powi(d as i32);
            (scaled - scaled.round()).abs() < 1e-6 * scaled.abs().max(1.0)
        })
        .unwrap_or(10)
}

/// Tick label with as many decimals as the tick spacing needs.
fn format_tick(value: f64, step: f64) -> String {
    let decimals = decimals(step);
    // Avoid "-0"
    let v = if value.abs() < step * 1e-6 { 0.0 } else { value };
    if decimals == 0 {
        format!("{}", v.round() as i64)
    } else {
        format!("{:.prec$}", v, prec = decimals)
    }
}

/// `10` with a superscript exponent, for powers of ten on log axes.
fn format_log_tick(value: f64) -> String {
    let exp = value.log10().round() as i32;
    if exp == 0 {
        return "1".to_string();
    }
    format!("10{}", superscript(exp))
}

fn superscript(n: i32) -> String {
    n.to_string()
        .chars()
        .map(|c| match c {
            '-' => '\u{207B}',
            '0' => '\u{2070}',
            '1' => '\u{00B9}',
            '2' => '\u{00B2}',
            '3' => '\u{00B3}',
            '4' => '\u{2074}',
            '5' => '\u{2075}',
            '6' => '\u{2076}',
            '7' => '\u{2077}',
            '8' => '\u{2078}',
            '9' => '\u{2079}',
            _ => c,
        })
        .collect()
}
