use crate::canvas::{self, AxesId, Axis, Canvas, FigureSpec, Rect, Scale, SeriesStyle, TickStyle};
use crate::color::{Color, BLACK, BLUE, RED};
use crate::error::{invalid, shape_err, Result};
use crate::layout::{axis_ticks, log_ticks};
use crate::utils::{extent, thin};
use crate::{Array1, Outcome, SkipReason};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;

const FIGSIZE: (f64, f64) = (8.0, 6.0);
const FONT_SIZE: f64 = 14.0;
const AXES_RECT: Rect = Rect::new(0.125, 0.11, 0.775, 0.77);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RmsConfig {
    /// Seconds between data points.  Bin sizes are shown in seconds when
    /// set, in points otherwise.
    pub cadence: Option<f64>,
    /// Draw every `binstep`-th RMS point.
    pub binstep: usize,
    /// Positions of dashed vertical markers, in x-axis units.
    pub timepoints: Vec<f64>,
    /// Plot RMS / std. error instead of both curves.
    pub ratio: bool,
    pub yrange: Option<(f64, f64)>,
    pub xrange: Option<(f64, f64)>,
    pub save_path: Option<PathBuf>,
}

impl Default for RmsConfig {
    fn default() -> Self {
        Self {
            cadence: None,
            binstep: 1,
            timepoints: Vec::new(),
            ratio: false,
            yrange: None,
            xrange: None,
            save_path: None,
        }
    }
}

/// Plots the RMS of fit residuals against bin size together with the
/// expectation for pure Gaussian noise, or the ratio of the two.
///
/// # Arguments
/// * `binsz` - Bin sizes, in data points
/// * `rms` - RMS of the binned residuals at each bin size
/// * `stderr` - Gaussian-noise projection at each bin size
/// * `rmserr` - Uncertainty of `rms`
///
/// Fewer than two bin sizes leave nothing to plot.
pub fn rms(
    canvas: &mut dyn Canvas,
    binsz: &[f64],
    rms: &[f64],
    stderr: &[f64],
    rmserr: &[f64],
    config: &RmsConfig,
) -> Result<Outcome> {
    if binsz.len() < 2 {
        debug!("RMS plot skipped: {} bin sizes", binsz.len());
        return Ok(Outcome::Skipped(SkipReason::TooFewBinSizes));
    }
    let n = binsz.len();
    if rms.len() != n || stderr.len() != n || rmserr.len() != n {
        return shape_err(format!(
            "{} bin sizes but rms, stderr and rmserr have {}, {} and {} values",
            n,
            rms.len(),
            stderr.len(),
            rmserr.len()
        ));
    }
    if config.binstep == 0 {
        return invalid("binstep must be at least 1");
    }

    let cadence = config.cadence.unwrap_or(1.0);
    let x_label = if config.cadence.is_some() {
        "Bin size  (sec)"
    } else {
        "Bin size"
    };
    let ratio: Array1 = rms.iter().zip(stderr).map(|(r, s)| r / s).collect();
    let y_range = config
        .yrange
        .unwrap_or_else(|| default_yrange(rms, stderr, rmserr, &ratio, config.ratio));
    let x_range = config.xrange.unwrap_or_else(|| {
        let largest = extent(binsz).map_or(1.0, |(_, hi)| hi);
        (cadence, largest * cadence)
    });
    let xs: Array1 = binsz.iter().map(|b| b * cadence).collect();
    let step = config.binstep;
    let errors = SeriesStyle::line(BLACK, 1.0);

    canvas.begin_figure(&FigureSpec::new(FIGSIZE.0, FIGSIZE.1))?;
    let ax = canvas.add_axes(AXES_RECT)?;
    let y_scale = if config.ratio {
        let ratio_err: Array1 = rmserr.iter().zip(stderr).map(|(e, s)| e / s).collect();
        canvas.error_bars(
            ax,
            &thin(&xs, step),
            &thin(&ratio, step),
            &thin(&ratio_err, step),
            &errors,
            Color::grey(0.5),
        )?;
        canvas.line_series(
            ax,
            &[x_range.0, x_range.1],
            &[1.0, 1.0],
            &SeriesStyle::line(RED, 2.0),
        )?;
        Scale::Linear
    } else {
        canvas.error_bars(
            ax,
            &thin(&xs, step),
            &thin(rms, step),
            &thin(rmserr, step),
            &errors.with_label("RMS"),
            Color::grey(0.5),
        )?;
        canvas.line_series(
            ax,
            &xs,
            stderr,
            &SeriesStyle::line(RED, 2.0).with_label("Gaussian std."),
        )?;
        Scale::Log
    };
    canvas.set_scale(ax, Axis::X, Scale::Log)?;
    canvas.set_scale(ax, Axis::Y, y_scale)?;
    if !config.ratio {
        canvas.legend(ax)?;
    }
    if !config.timepoints.is_empty() {
        canvas.vertical_lines(
            ax,
            &config.timepoints,
            y_range,
            &SeriesStyle::line(BLUE, 2.0).dashed(),
        )?;
    }

    set_ticks(canvas, ax, Axis::X, Scale::Log, x_range)?;
    set_ticks(canvas, ax, Axis::Y, y_scale, y_range)?;
    canvas.set_limits(ax, Axis::Y, y_range.0, y_range.1)?;
    canvas.set_limits(ax, Axis::X, x_range.0, x_range.1)?;
    let y_label = if config.ratio {
        "\u{03b2} = RMS / std. error"
    } else {
        "RMS"
    };
    canvas.set_label(ax, Axis::Y, y_label, FONT_SIZE)?;
    canvas.set_label(ax, Axis::X, x_label, FONT_SIZE)?;

    canvas::finish(canvas, config.save_path.as_deref())?;
    Ok(Outcome::Drawn { panels: 1 })
}

fn default_yrange(
    rms: &[f64],
    stderr: &[f64],
    rmserr: &[f64],
    ratio: &[f64],
    as_ratio: bool,
) -> (f64, f64) {
    if as_ratio {
        let top = extent(ratio).map_or(0.0, |(_, hi)| hi);
        return (0.0, top + 1.0);
    }
    let lows: Array1 = rms.iter().zip(rmserr).map(|(r, e)| r - e).collect();
    let highs: Array1 = rms.iter().zip(rmserr).map(|(r, e)| r + e).collect();
    let lo = extent(&lows).map_or(f64::NAN, |(lo, _)| lo);
    let hi = extent(&highs).map_or(f64::NAN, |(_, hi)| hi);
    let last = stderr.last().copied().unwrap_or(lo);
    (lo.min(last), hi)
}

fn set_ticks(
    canvas: &mut dyn Canvas,
    ax: AxesId,
    axis: Axis,
    scale: Scale,
    range: (f64, f64),
) -> Result<()> {
    let ticks = match scale {
        Scale::Log => log_ticks(range.0, range.1),
        Scale::Linear => axis_ticks(range.0, range.1, false),
    };
    canvas.set_ticks(ax, axis, &ticks, &TickStyle::visible(FONT_SIZE))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{Op, Recorder};
    use crate::PlotError;

    struct Curves {
        binsz: Array1,
        rms: Array1,
        stderr: Array1,
        rmserr: Array1,
    }

    fn curves() -> Curves {
        let binsz: Array1 = vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0];
        let stderr: Array1 = binsz.iter().map(|b| 0.01 / b.sqrt()).collect();
        let rms: Array1 = stderr.iter().map(|s| 1.2 * s).collect();
        let rmserr: Array1 = rms.iter().map(|r| 0.1 * r).collect();
        Curves {
            binsz,
            rms,
            stderr,
            rmserr,
        }
    }

    fn draw(canvas: &mut Recorder, c: &Curves, config: &RmsConfig) -> Result<Outcome> {
        rms(canvas, &c.binsz, &c.rms, &c.stderr, &c.rmserr, config)
    }

    #[test]
    fn test_single_bin_size_is_noop() {
        let mut canvas = Recorder::new();
        let config = RmsConfig::default();
        let outcome = rms(&mut canvas, &[1.0], &[0.1], &[0.1], &[0.01], &config).unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::TooFewBinSizes));
        assert!(canvas.ops.is_empty());
        assert_eq!(canvas.figures(), 0);
    }

    #[test]
    fn test_log_log_with_default_ranges() {
        let c = curves();
        let mut canvas = Recorder::new();
        let outcome = draw(&mut canvas, &c, &RmsConfig::default()).unwrap();
        assert_eq!(outcome.panels(), 1);

        assert!(canvas.ops.contains(&Op::Scale {
            axes: 0,
            axis: Axis::X,
            scale: Scale::Log
        }));
        assert!(canvas.ops.contains(&Op::Scale {
            axes: 0,
            axis: Axis::Y,
            scale: Scale::Log
        }));
        assert_eq!(canvas.count(|op| matches!(op, Op::Legend(0))), 1);
        assert_eq!(canvas.limits(0, Axis::X), Some((1.0, 32.0)));

        let (lo, hi) = canvas.limits(0, Axis::Y).unwrap();
        // The last Gaussian value sits below every rms - rmserr.
        assert_abs_diff_eq!(lo, c.stderr[5], epsilon = 1e-15);
        assert_abs_diff_eq!(hi, 1.1 * c.rms[0], epsilon = 1e-15);
        let labels = canvas.labels(Axis::X);
        assert_eq!(labels[0].1, "Bin size");
    }

    #[test]
    fn test_ratio_mode() {
        let c = curves();
        let mut canvas = Recorder::new();
        let config = RmsConfig {
            ratio: true,
            cadence: Some(2.0),
            binstep: 2,
            ..Default::default()
        };
        draw(&mut canvas, &c, &config).unwrap();

        assert_eq!(canvas.count(|op| matches!(op, Op::Legend(_))), 0);
        let (lo, hi) = canvas.limits(0, Axis::Y).unwrap();
        assert_eq!(lo, 0.0);
        assert_abs_diff_eq!(hi, 2.2, epsilon = 1e-12);
        assert_eq!(canvas.limits(0, Axis::X), Some((2.0, 64.0)));

        for op in &canvas.ops {
            match op {
                Op::ErrorBars { xs, ys, .. } => {
                    assert_eq!(xs, &vec![2.0, 8.0, 32.0]);
                    for y in ys {
                        assert_abs_diff_eq!(*y, 1.2, epsilon = 1e-12);
                    }
                }
                Op::Line { xs, ys, .. } => {
                    assert_eq!(xs, &vec![2.0, 64.0]);
                    assert_eq!(ys, &vec![1.0, 1.0]);
                }
                _ => {}
            }
        }
        let y = canvas.labels(Axis::Y);
        assert_eq!(y[0].1, "\u{03b2} = RMS / std. error");
        assert_eq!(canvas.labels(Axis::X)[0].1, "Bin size  (sec)");
    }

    #[test]
    fn test_timepoints_and_explicit_ranges() {
        let c = curves();
        let mut canvas = Recorder::new();
        let config = RmsConfig {
            timepoints: vec![3.0, 10.0],
            yrange: Some((1e-4, 1e-1)),
            xrange: Some((0.5, 50.0)),
            ..Default::default()
        };
        draw(&mut canvas, &c, &config).unwrap();
        assert!(canvas.ops.contains(&Op::VLines {
            axes: 0,
            xs: vec![3.0, 10.0],
            y_range: (1e-4, 1e-1)
        }));
        assert_eq!(canvas.limits(0, Axis::X), Some((0.5, 50.0)));
        assert_eq!(canvas.ticks(0, Axis::X).unwrap().0, vec![1.0, 10.0]);
    }

    #[test]
    fn test_mismatched_lengths() {
        let c = curves();
        let mut canvas = Recorder::new();
        let config = RmsConfig::default();
        let err = rms(
            &mut canvas,
            &c.binsz,
            &c.rms[..3],
            &c.stderr,
            &c.rmserr,
            &config,
        );
        assert!(matches!(err, Err(PlotError::Shape(_))));
        let config = RmsConfig {
            binstep: 0,
            ..Default::default()
        };
        assert!(matches!(
            draw(&mut canvas, &c, &config),
            Err(PlotError::InvalidInput(_))
        ));
        assert!(canvas.ops.is_empty());
    }
}
