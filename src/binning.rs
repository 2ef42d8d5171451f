use crate::error::{invalid, shape_err, Result};
use crate::utils::mean;
use crate::Array1;
use average::WeightedMean;

/// Data, uncertainties and independent variable reduced to bins.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedData {
    pub data: Array1,
    pub uncert: Array1,
    pub indparams: Array1,
}

impl BinnedData {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reduces evenly sampled arrays to bins of `binsize` consecutive points.
/// The model-fit figure goes through this trait so callers can plug in
/// their own binning scheme.
pub trait Binner {
    fn bin(&self, data: &[f64], uncert: &[f64], indparams: &[f64], binsize: usize)
        -> Result<BinnedData>;

    fn bin_model(&self, model: &[f64], binsize: usize) -> Result<Array1>;
}

/// Inverse-variance weighted binning.  The last bin takes whatever points
/// are left over.
///
/// Each bin holds the weighted mean of its data, with weights `1 / uncert^2`,
/// an uncertainty of `sqrt(1 / sum(weights))`, and the plain mean of its
/// independent variable.  Models are binned with a plain mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedBinner;

fn check_binsize(binsize: usize) -> Result<()> {
    if binsize == 0 {
        return invalid("bin size must be at least 1");
    }
    Ok(())
}

impl Binner for WeightedBinner {
    fn bin(
        &self,
        data: &[f64],
        uncert: &[f64],
        indparams: &[f64],
        binsize: usize,
    ) -> Result<BinnedData> {
        check_binsize(binsize)?;
        if uncert.len() != data.len() || indparams.len() != data.len() {
            return shape_err(format!(
                "cannot bin {} data points with {} uncertainties and {} independent values",
                data.len(),
                uncert.len(),
                indparams.len()
            ));
        }
        if let Some(bad) = uncert.iter().find(|u| !(**u > 0.0)) {
            return invalid(format!("uncertainties must be positive, got {}", bad));
        }

        let mut binned = BinnedData {
            data: Vec::new(),
            uncert: Vec::new(),
            indparams: Vec::new(),
        };
        for ((values, sigmas), xs) in data
            .chunks(binsize)
            .zip(uncert.chunks(binsize))
            .zip(indparams.chunks(binsize))
        {
            let mut weighted = WeightedMean::new();
            for (&v, &s) in values.iter().zip(sigmas) {
                weighted.add(v, 1.0 / (s * s));
            }
            binned.data.push(weighted.mean());
            binned.uncert.push((1.0 / weighted.sum_weights()).sqrt());
            binned.indparams.push(mean(xs).unwrap_or(f64::NAN));
        }
        Ok(binned)
    }

    fn bin_model(&self, model: &[f64], binsize: usize) -> Result<Array1> {
        check_binsize(binsize)?;
        Ok(model
            .chunks(binsize)
            .map(|chunk| mean(chunk).unwrap_or(f64::NAN))
            .collect())
    }
}
