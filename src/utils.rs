use crate::error::{invalid, shape_err, PlotError, Result};
use crate::{Array1, Array2};
use average::{Max, Mean, Min};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// Keep every `thinning`-th value of a row, starting with the first.
pub fn thin(row: &[f64], thinning: usize) -> Array1 {
    row.iter().step_by(thinning.max(1)).copied().collect()
}

pub(crate) fn check_thinning(thinning: usize) -> Result<()> {
    if thinning == 0 {
        return invalid("thinning factor must be at least 1");
    }
    Ok(())
}

/// Checks that every row of a parameter-by-sample matrix has the same,
/// nonzero length and that there is one name per row.  Returns the row
/// length.
pub(crate) fn check_samples(samples: &Array2, names: usize) -> Result<usize> {
    if names != samples.len() {
        return shape_err(format!(
            "{} names for {} parameter rows",
            names,
            samples.len()
        ));
    }
    let len = samples.first().map_or(0, Vec::len);
    if let Some(i) = samples.iter().position(|row| row.len() != len) {
        return shape_err(format!(
            "parameter row {} has {} samples, expected {}",
            i,
            samples[i].len(),
            len
        ));
    }
    if len == 0 && !samples.is_empty() {
        return shape_err("parameter rows hold no samples");
    }
    Ok(len)
}

/// Smallest and largest finite value of an array, or `None` when there is
/// no finite value at all.
pub fn extent(values: &[f64]) -> Option<(f64, f64)> {
    let finite = || values.iter().copied().filter(|v| v.is_finite());
    if finite().next().is_none() {
        return None;
    }
    let lo: Min = finite().collect();
    let hi: Max = finite().collect();
    Some((lo.min(), hi.max()))
}

/// Arithmetic mean of an array, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let m: Mean = values.iter().copied().collect();
    Some(m.mean())
}

/// `n` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Array1 {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Bar heights of a 1D histogram and the `counts.len() + 1` bin edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Array1,
    pub counts: Array1,
}

impl Histogram {
    /// Height of the tallest bar (0 for an empty histogram).
    pub fn max_count(&self) -> f64 {
        self.counts.iter().copied().fold(0.0, f64::max)
    }
}

/// Bin range the way numpy picks it: the data extent, widened by 0.5 on
/// both sides when it is degenerate.
fn bin_range(values: &[f64]) -> (f64, f64) {
    match extent(values) {
        None => (0.0, 1.0),
        Some((lo, hi)) if lo == hi => (lo - 0.5, hi + 0.5),
        Some(range) => range,
    }
}

fn bin_index(v: f64, lo: f64, hi: f64, bins: usize) -> Option<usize> {
    if !v.is_finite() || v < lo || v > hi {
        return None;
    }
    // The upper edge belongs to the last bin.
    let idx = ((v - lo) / (hi - lo) * bins as f64) as usize;
    Some(idx.min(bins - 1))
}

/// Histogram of `values` into `bins` equal-width bins spanning the data.
/// Non-finite values are ignored.
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    let bins = bins.max(1);
    let (lo, hi) = bin_range(values);
    let mut counts = vec![0.0; bins];
    for &v in values {
        if let Some(i) = bin_index(v, lo, hi, bins) {
            counts[i] += 1.0;
        }
    }
    Histogram {
        edges: linspace(lo, hi, bins + 1),
        counts,
    }
}

/// Joint histogram of paired samples.  `counts[ix][iy]` holds the number of
/// pairs falling in x-bin `ix` and y-bin `iy`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2d {
    pub x_edges: Array1,
    pub y_edges: Array1,
    pub counts: Array2,
}

pub fn histogram2d(xs: &[f64], ys: &[f64], bins: usize) -> Histogram2d {
    let bins = bins.max(1);
    let n = xs.len().min(ys.len());
    let (x_lo, x_hi) = bin_range(&xs[..n]);
    let (y_lo, y_hi) = bin_range(&ys[..n]);
    let mut counts = vec![vec![0.0; bins]; bins];
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        if let (Some(ix), Some(iy)) = (
            bin_index(x, x_lo, x_hi, bins),
            bin_index(y, y_lo, y_hi, bins),
        ) {
            counts[ix][iy] += 1.0;
        }
    }
    Histogram2d {
        x_edges: linspace(x_lo, x_hi, bins + 1),
        y_edges: linspace(y_lo, y_hi, bins + 1),
        counts,
    }
}

/// Reads a comma-separated file column-wise: the result holds one vector per
/// column.  `skip_rows` leading lines are dropped and at most `n_rows` lines
/// are read after that.
pub fn read_csv(path: &Path, skip_rows: usize, n_rows: Option<usize>) -> Result<Array2> {
    let f = BufReader::new(File::open(path)?);
    let mut result: Array2 = Vec::new();
    let take = n_rows.unwrap_or(usize::MAX);
    for (lineno, line) in f.lines().enumerate().skip(skip_rows).take(take) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        for (idx, value) in line.split(',').enumerate() {
            if idx >= result.len() {
                result.push(Vec::new())
            }
            let parsed = value.trim().parse::<f64>().map_err(|e| {
                PlotError::Parse(format!(
                    "{}:{}: bad value {:?}: {}",
                    path.display(),
                    lineno + 1,
                    value,
                    e
                ))
            })?;
            result[idx].push(parsed);
        }
    }
    Ok(result)
}
