use crate::binning::Binner;
use crate::canvas::{
    self, AxesId, Axis, Canvas, FigureSpec, Marker, Rect, SeriesStyle, TickStyle,
};
use crate::color::{BLACK, BLUE};
use crate::error::{invalid, shape_err, Result};
use crate::layout::{axis_ticks, padded_limits};
use crate::utils::extent;
use crate::{Array1, Outcome};
use serde::Deserialize;
use std::path::PathBuf;

const FIGSIZE: (f64, f64) = (8.0, 6.0);
const FONT_SIZE: f64 = 14.0;
const RESIDUAL_RECT: Rect = Rect::new(0.15, 0.10, 0.80, 0.20);
const MAIN_RECT: Rect = Rect::new(0.15, 0.35, 0.80, 0.55);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelFitConfig {
    /// Number of bins the data is reduced to.
    pub nbins: usize,
    pub title: Option<String>,
    pub save_path: Option<PathBuf>,
}

impl Default for ModelFitConfig {
    fn default() -> Self {
        Self {
            nbins: 75,
            title: None,
            save_path: None,
        }
    }
}

/// Points per bin so that `len` points give at most `nbins` bins.
pub fn bin_size(len: usize, nbins: usize) -> usize {
    len.saturating_sub(1) / nbins.max(1) + 1
}

/// Plots the binned data against the model, with the binned residuals in a
/// strip underneath.
///
/// The model is drawn at full resolution; residuals compare the binned data
/// with the model binned the same way.
pub fn modelfit(
    canvas: &mut dyn Canvas,
    data: &[f64],
    uncert: &[f64],
    indparams: &[f64],
    model: &[f64],
    binner: &dyn Binner,
    config: &ModelFitConfig,
) -> Result<Outcome> {
    if config.nbins == 0 {
        return invalid("nbins must be at least 1");
    }
    let n = data.len();
    if n == 0 {
        return shape_err("no data points to fit");
    }
    if uncert.len() != n || indparams.len() != n || model.len() != n {
        return shape_err(format!(
            "data has {} points but uncert, indparams and model have {}, {} and {}",
            n,
            uncert.len(),
            indparams.len(),
            model.len()
        ));
    }
    let binsize = bin_size(n, config.nbins);
    let binned = binner.bin(data, uncert, indparams, binsize)?;
    let binned_model = binner.bin_model(model, binsize)?;
    if binned_model.len() != binned.len() {
        return shape_err(format!(
            "binner returned {} data bins but {} model bins",
            binned.len(),
            binned_model.len()
        ));
    }
    let residuals: Array1 = binned
        .data
        .iter()
        .zip(&binned_model)
        .map(|(d, m)| d - m)
        .collect();

    let x_lim = extent(indparams).map_or((0.0, 1.0), |(lo, hi)| padded_limits(lo, hi));
    let points = SeriesStyle::markers(BLACK, Marker::Circle, 4.0);

    canvas.begin_figure(&FigureSpec::new(FIGSIZE.0, FIGSIZE.1))?;

    let resid_ax = canvas.add_axes(RESIDUAL_RECT)?;
    canvas.error_bars(
        resid_ax,
        &binned.indparams,
        &residuals,
        &binned.uncert,
        &points,
        BLACK,
    )?;
    let zero_line = [indparams[0], indparams[n - 1]];
    canvas.line_series(
        resid_ax,
        &zero_line,
        &[0.0, 0.0],
        &SeriesStyle::line(BLACK, 1.5).dotted(),
    )?;
    let r_lim = error_extent(&residuals, &binned.uncert, Some(0.0));
    canvas.set_limits(resid_ax, Axis::X, x_lim.0, x_lim.1)?;
    canvas.set_limits(resid_ax, Axis::Y, r_lim.0, r_lim.1)?;
    set_ticks(canvas, resid_ax, x_lim, r_lim, true)?;
    canvas.set_label(resid_ax, Axis::X, "x", FONT_SIZE)?;
    canvas.set_label(resid_ax, Axis::Y, "Residuals", FONT_SIZE)?;

    let main_ax = canvas.add_axes(MAIN_RECT)?;
    if let Some(title) = &config.title {
        canvas.set_title(main_ax, title, FONT_SIZE)?;
    }
    canvas.error_bars(
        main_ax,
        &binned.indparams,
        &binned.data,
        &binned.uncert,
        &points.clone().with_label("Binned Data"),
        BLACK,
    )?;
    canvas.line_series(
        main_ax,
        indparams,
        model,
        &SeriesStyle::line(BLUE, 2.0).with_label("Best Fit"),
    )?;
    let y_lim = {
        let (lo, hi) = error_extent(&binned.data, &binned.uncert, None);
        match extent(model) {
            Some((m_lo, m_hi)) => padded_limits(lo.min(m_lo), hi.max(m_hi)),
            None => padded_limits(lo, hi),
        }
    };
    canvas.set_limits(main_ax, Axis::X, x_lim.0, x_lim.1)?;
    canvas.set_limits(main_ax, Axis::Y, y_lim.0, y_lim.1)?;
    set_ticks(canvas, main_ax, x_lim, y_lim, false)?;
    canvas.set_label(main_ax, Axis::Y, "y", FONT_SIZE)?;
    canvas.legend(main_ax)?;

    canvas::finish(canvas, config.save_path.as_deref())?;
    Ok(Outcome::Drawn { panels: 2 })
}

/// Range covered by values plus or minus their errors, optionally forced to
/// include `anchor`.
fn error_extent(values: &[f64], errors: &[f64], anchor: Option<f64>) -> (f64, f64) {
    let lows: Array1 = values.iter().zip(errors).map(|(v, e)| v - e).collect();
    let highs: Array1 = values.iter().zip(errors).map(|(v, e)| v + e).collect();
    let lo = extent(&lows).map(|(lo, _)| lo);
    let hi = extent(&highs).map(|(_, hi)| hi);
    match (lo, hi) {
        (Some(lo), Some(hi)) => {
            let a = anchor.unwrap_or(lo);
            padded_limits(lo.min(a), hi.max(a))
        }
        _ => (-1.0, 1.0),
    }
}

fn set_ticks(
    canvas: &mut dyn Canvas,
    ax: AxesId,
    x_lim: (f64, f64),
    y_lim: (f64, f64),
    x_labels: bool,
) -> Result<()> {
    let x_style = if x_labels {
        TickStyle::visible(FONT_SIZE)
    } else {
        TickStyle::hidden()
    };
    canvas.set_ticks(ax, Axis::X, &axis_ticks(x_lim.0, x_lim.1, false), &x_style)?;
    canvas.set_ticks(
        ax,
        Axis::Y,
        &axis_ticks(y_lim.0, y_lim.1, false),
        &TickStyle::visible(if x_labels { FONT_SIZE } else { FONT_SIZE - 1.0 }),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::{BinnedData, WeightedBinner};
    use crate::recorder::{Op, Recorder};
    use crate::PlotError;

    fn line_data(n: usize) -> (Array1, Array1, Array1, Array1) {
        let x: Array1 = (0..n).map(|i| i as f64 * 0.1).collect();
        let model: Array1 = x.iter().map(|x| 2.0 * x + 1.0).collect();
        let data: Array1 = model
            .iter()
            .enumerate()
            .map(|(i, m)| m + if i % 2 == 0 { 0.05 } else { -0.05 })
            .collect();
        (data, vec![0.1; n], x, model)
    }

    #[test]
    fn test_bin_size() {
        assert_eq!(bin_size(150, 75), 2);
        assert_eq!(bin_size(75, 75), 1);
        assert_eq!(bin_size(76, 75), 2);
        assert_eq!(bin_size(1000, 75), 14);
        assert_eq!(bin_size(1, 75), 1);
    }

    #[test]
    fn test_two_axes_with_residuals() {
        let (data, uncert, x, model) = line_data(150);
        let mut canvas = Recorder::new();
        let config = ModelFitConfig {
            title: Some("fit".into()),
            ..Default::default()
        };
        let outcome = modelfit(
            &mut canvas,
            &data,
            &uncert,
            &x,
            &model,
            &WeightedBinner,
            &config,
        )
        .unwrap();
        assert_eq!(outcome, Outcome::Drawn { panels: 2 });

        let rects: Vec<Rect> = canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::AddAxes(rect) => Some(*rect),
                _ => None,
            })
            .collect();
        assert_eq!(rects, vec![RESIDUAL_RECT, MAIN_RECT]);

        let bars: Vec<(usize, &Vec<f64>)> = canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::ErrorBars { axes, ys, .. } => Some((*axes, ys)),
                _ => None,
            })
            .collect();
        assert_eq!(bars.len(), 2);
        // Pairs of +0.05 / -0.05 cancel, so the binned residuals vanish.
        let (resid_ax, residuals) = bars[0];
        assert_eq!(resid_ax, 0);
        assert_eq!(residuals.len(), 75);
        for r in residuals {
            assert_abs_diff_eq!(*r, 0.0, epsilon = 1e-9);
        }

        assert_eq!(canvas.count(|op| matches!(op, Op::Legend(1))), 1);
        assert!(canvas
            .ops
            .iter()
            .any(|op| matches!(op, Op::Title { axes: 1, text } if text == "fit")));
        assert!(!canvas.ticks(1, Axis::X).unwrap().1.visible);
        assert!(canvas.ticks(0, Axis::X).unwrap().1.visible);
        let labels = canvas.labels(Axis::Y);
        assert_eq!(
            labels,
            vec![(0, "Residuals".to_string()), (1, "y".to_string())]
        );
    }

    #[test]
    fn test_zero_line_spans_independent_range() {
        let (data, uncert, x, model) = line_data(20);
        let mut canvas = Recorder::new();
        let config = ModelFitConfig::default();
        modelfit(
            &mut canvas,
            &data,
            &uncert,
            &x,
            &model,
            &WeightedBinner,
            &config,
        )
        .unwrap();
        let zero = canvas
            .ops
            .iter()
            .find_map(|op| match op {
                Op::Line {
                    axes: 0,
                    xs,
                    ys,
                    style,
                } => Some((xs.clone(), ys.clone(), style.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(zero.0, vec![0.0, x[19]]);
        assert_eq!(zero.1, vec![0.0, 0.0]);
        assert_eq!(zero.2.line, crate::canvas::LineKind::Dotted);
    }

    struct ShortBinner;

    impl Binner for ShortBinner {
        fn bin(&self, data: &[f64], _: &[f64], _: &[f64], _: usize) -> Result<BinnedData> {
            Ok(BinnedData {
                data: data.to_vec(),
                uncert: vec![1.0; data.len()],
                indparams: vec![0.0; data.len()],
            })
        }

        fn bin_model(&self, _: &[f64], _: usize) -> Result<Array1> {
            Ok(vec![0.0])
        }
    }

    #[test]
    fn test_bad_input_draws_nothing() {
        let (data, uncert, x, model) = line_data(10);
        let mut canvas = Recorder::new();
        let config = ModelFitConfig::default();
        assert!(matches!(
            modelfit(
                &mut canvas,
                &data,
                &uncert[..5],
                &x,
                &model,
                &WeightedBinner,
                &config,
            ),
            Err(PlotError::Shape(_))
        ));
        let zero_bins = ModelFitConfig {
            nbins: 0,
            ..Default::default()
        };
        assert!(matches!(
            modelfit(
                &mut canvas,
                &data,
                &uncert,
                &x,
                &model,
                &WeightedBinner,
                &zero_bins,
            ),
            Err(PlotError::InvalidInput(_))
        ));
        assert!(matches!(
            modelfit(
                &mut canvas,
                &data,
                &uncert,
                &x,
                &model,
                &ShortBinner,
                &config,
            ),
            Err(PlotError::Shape(_))
        ));
        assert!(canvas.ops.is_empty());
    }
}
