use crate::error::{invalid, shape_err, Result};
use crate::{Array2, Array3};
use log::debug;
use serde::Deserialize;

/// Parameter names paired with the step sizes the sampler used for them.
///
/// A parameter with a zero step size was held fixed and carries no
/// information worth plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    names: Vec<String>,
    stepsizes: Vec<f64>,
}

impl ParameterSet {
    pub fn new(names: Vec<String>, stepsizes: Vec<f64>) -> Result<Self> {
        if names.len() != stepsizes.len() {
            return shape_err(format!(
                "{} parameter names but {} step sizes",
                names.len(),
                stepsizes.len()
            ));
        }
        Ok(Self { names, stepsizes })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn stepsizes(&self) -> &[f64] {
        &self.stepsizes
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `true` for every parameter that was varied during sampling.
    pub fn free_mask(&self) -> Vec<bool> {
        self.stepsizes.iter().map(|&s| s != 0.0).collect()
    }

    /// Keeps the entries selected by `mask`, in their original order.
    pub fn filter(&self, mask: &[bool]) -> ParameterSet {
        let (names, stepsizes): (Vec<String>, Vec<f64>) = self
            .names
            .iter()
            .zip(self.stepsizes.iter())
            .zip(mask.iter())
            .filter(|(_, keep)| **keep)
            .map(|((n, &s), _)| (n.clone(), s))
            .unzip();
        ParameterSet { names, stepsizes }
    }
}

/// Checks that a sample tensor is rectangular and that the burn-in leaves at
/// least one iteration.  Returns `(chains, parameters, iterations)`.
pub fn tensor_shape(tensor: &Array3, burnin: usize) -> Result<(usize, usize, usize)> {
    let chains = tensor.len();
    if chains == 0 {
        return shape_err("sample tensor has no chains");
    }
    let params = tensor[0].len();
    if params == 0 {
        return shape_err("sample tensor has no parameters");
    }
    let iters = tensor[0][0].len();
    for (c, chain) in tensor.iter().enumerate() {
        if chain.len() != params {
            return shape_err(format!(
                "chain {} has {} parameters, expected {}",
                c,
                chain.len(),
                params
            ));
        }
        if let Some(p) = chain.iter().position(|row| row.len() != iters) {
            return shape_err(format!(
                "chain {} parameter {} has {} iterations, expected {}",
                c,
                p,
                chain[p].len(),
                iters
            ));
        }
    }
    if iters == 0 {
        return shape_err("sample tensor has no iterations");
    }
    if burnin >= iters {
        return shape_err(format!(
            "burn-in of {} leaves nothing of {} iterations",
            burnin, iters
        ));
    }
    Ok((chains, params, iters))
}

/// Drops the first `burnin` iterations of every chain and concatenates the
/// rest, chain after chain, into one row per parameter.
pub fn stack_chains(tensor: &Array3, burnin: usize) -> Result<Array2> {
    let (chains, params, iters) = tensor_shape(tensor, burnin)?;
    let pooled = chains * (iters - burnin);
    let mut stacked: Array2 = (0..params).map(|_| Vec::with_capacity(pooled)).collect();
    for chain in tensor {
        for (row, values) in stacked.iter_mut().zip(chain.iter()) {
            row.extend_from_slice(&values[burnin..]);
        }
    }
    Ok(stacked)
}

/// Positions in the pooled axis where one chain ends and the next begins.
pub fn chain_boundaries(chains: usize, chain_len: usize) -> Vec<usize> {
    (1..chains).map(|j| j * chain_len).collect()
}

/// Reference abundances for the species fit by the sampler.
///
/// The fitted abundance parameters are the trailing `molfit.len()` entries of
/// the parameter set, in `molfit` order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AbundanceConfig {
    /// Species whose log-abundance scaling factors were sampled.
    pub molfit: Vec<String>,
    /// Whitespace-separated species identifiers of the atmospheric model.
    pub out_species: String,
    /// Reference molar fraction for each entry of `out_species`.
    pub reference: Vec<f64>,
}

/// Additive log10 offsets turning sampled abundance scaling factors into
/// log molar fractions.
#[derive(Debug, Clone, PartialEq)]
pub struct AbundanceCorrection {
    offsets: Vec<(usize, f64)>,
}

impl AbundanceCorrection {
    /// Works out the offset for every fitted species.
    ///
    /// Returns `Ok(None)` without touching anything when some fitted
    /// abundance was held fixed or sampled with a negative step, since the
    /// samples are then not plain scaling factors.
    pub fn compute(params: &ParameterSet, config: &AbundanceConfig) -> Result<Option<Self>> {
        let nmol = config.molfit.len();
        if nmol == 0 {
            return Ok(None);
        }
        if nmol > params.len() {
            return shape_err(format!(
                "{} fitted species but only {} parameters",
                nmol,
                params.len()
            ));
        }
        let first = params.len() - nmol;
        if params.stepsizes()[first..].iter().any(|&s| s <= 0.0) {
            debug!("abundance stepsizes are not all positive, skipping molar-fraction correction");
            return Ok(None);
        }

        let species: Vec<&str> = config.out_species.split_whitespace().collect();
        if species.len() != config.reference.len() {
            return shape_err(format!(
                "{} output species but {} reference abundances",
                species.len(),
                config.reference.len()
            ));
        }

        let mut offsets = Vec::with_capacity(nmol);
        for (i, mol) in config.molfit.iter().enumerate() {
            let tag = format!("{}_", mol);
            let slot = match species.iter().position(|s| s.contains(&tag)) {
                Some(slot) => slot,
                None => {
                    return invalid(format!("fitted species {} not among output species", mol))
                }
            };
            let value = config.reference[slot];
            if !(value > 0.0 && value.is_finite()) {
                return invalid(format!(
                    "reference abundance of {} must be positive, got {}",
                    species[slot], value
                ));
            }
            offsets.push((first + i, value.log10()));
        }
        Ok(Some(Self { offsets }))
    }

    /// `(parameter index, log10 offset)` pairs.
    pub fn offsets(&self) -> &[(usize, f64)] {
        &self.offsets
    }

    /// Adds each offset to its parameter row, in place.
    pub fn apply(&self, samples: &mut Array2) {
        for &(row, offset) in &self.offsets {
            if let Some(values) = samples.get_mut(row) {
                values.iter_mut().for_each(|v| *v += offset);
            }
        }
    }
}

/// Removes the rows of fixed parameters from the samples and the parameter
/// set using one shared mask.
pub fn filter_free(samples: Array2, params: &ParameterSet) -> Result<(Array2, ParameterSet)> {
    if samples.len() != params.len() {
        return shape_err(format!(
            "{} sample rows but {} parameters",
            samples.len(),
            params.len()
        ));
    }
    let mask = params.free_mask();
    let kept = samples
        .into_iter()
        .zip(mask.iter())
        .filter(|(_, keep)| **keep)
        .map(|(row, _)| row)
        .collect();
    Ok((kept, params.filter(&mask)))
}

/// Display-ready samples of the free parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedChains {
    /// One row per free parameter, chains pooled after burn-in.
    pub samples: Array2,
    /// The free parameters, row for row.
    pub params: ParameterSet,
    pub chains: usize,
    /// Post-burn-in iterations contributed by each chain.
    pub chain_len: usize,
    /// The molar-fraction correction, when one was applied.
    pub correction: Option<AbundanceCorrection>,
}

impl AggregatedChains {
    pub fn pooled_len(&self) -> usize {
        self.chains * self.chain_len
    }

    pub fn boundaries(&self) -> Vec<usize> {
        chain_boundaries(self.chains, self.chain_len)
    }

    pub fn names(&self) -> &[String] {
        self.params.names()
    }
}

/// Stacks the chains, applies the abundance correction when it is requested
/// and valid, then drops the fixed parameters.
///
/// # Arguments
/// * `tensor` - Samples indexed as `[chain][parameter][iteration]`
/// * `burnin` - Leading iterations to discard from every chain
/// * `params` - Names and step sizes, one per tensor parameter
/// * `abundance` - Reference abundances for the molar-fraction correction
pub fn aggregate(
    tensor: &Array3,
    burnin: usize,
    params: &ParameterSet,
    abundance: Option<&AbundanceConfig>,
) -> Result<AggregatedChains> {
    let (chains, nparams, iters) = tensor_shape(tensor, burnin)?;
    if nparams != params.len() {
        return shape_err(format!(
            "tensor holds {} parameters but {} were named",
            nparams,
            params.len()
        ));
    }
    let correction = match abundance {
        Some(config) => AbundanceCorrection::compute(params, config)?,
        None => None,
    };

    let mut stacked = stack_chains(tensor, burnin)?;
    if let Some(correction) = &correction {
        correction.apply(&mut stacked);
    }
    let (samples, params) = filter_free(stacked, params)?;
    debug!(
        "aggregated {} chains into {} free of {} parameters",
        chains,
        params.len(),
        nparams
    );
    Ok(AggregatedChains {
        samples,
        params,
        chains,
        chain_len: iters - burnin,
        correction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tensor whose values encode their own position: c*1e4 + p*1e2 + i.
    fn tagged_tensor(chains: usize, params: usize, iters: usize) -> Array3 {
        (0..chains)
            .map(|c| {
                (0..params)
                    .map(|p| {
                        (0..iters)
                            .map(|i| (c * 10_000 + p * 100 + i) as f64)
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{}", i)).collect()
    }

    #[test]
    fn test_stacking_shape_and_blocks() {
        let (c, p, n, b) = (3, 2, 50, 10);
        let tensor = tagged_tensor(c, p, n);
        let stacked = stack_chains(&tensor, b).unwrap();
        assert_eq!(stacked.len(), p);
        for row in &stacked {
            assert_eq!(row.len(), c * (n - b));
        }
        for chain in 0..c {
            for param in 0..p {
                let block = &stacked[param][chain * (n - b)..(chain + 1) * (n - b)];
                assert_eq!(block, &tensor[chain][param][b..]);
            }
        }
    }

    #[test]
    fn test_shape_errors() {
        let tensor = tagged_tensor(2, 2, 10);
        assert!(matches!(
            stack_chains(&tensor, 10),
            Err(crate::PlotError::Shape(_))
        ));
        assert!(stack_chains(&Vec::new(), 0).is_err());

        let mut ragged = tagged_tensor(2, 2, 10);
        ragged[1][0].pop();
        assert!(matches!(
            stack_chains(&ragged, 0),
            Err(crate::PlotError::Shape(_))
        ));

        let params = ParameterSet::new(names(3), vec![1.0; 3]).unwrap();
        assert!(aggregate(&tensor, 0, &params, None).is_err());
        assert!(ParameterSet::new(names(2), vec![1.0]).is_err());
    }

    #[test]
    fn test_chain_boundaries() {
        assert_eq!(chain_boundaries(3, 80), vec![80, 160]);
        assert!(chain_boundaries(1, 80).is_empty());
    }

    #[test]
    fn test_filter_preserves_order() {
        let steps = vec![0.1, 0.0, -0.2, 0.0, 3.0];
        let params = ParameterSet::new(names(5), steps.clone()).unwrap();
        let samples: Array2 = (0..5).map(|i| vec![i as f64; 4]).collect();
        let (kept, free) = filter_free(samples, &params).unwrap();

        let nonzero = steps.iter().filter(|&&s| s != 0.0).count();
        assert_eq!(free.len(), nonzero);
        assert_eq!(kept.len(), nonzero);
        assert_eq!(free.names(), &["p0", "p2", "p4"]);
        assert_eq!(kept[1], vec![2.0; 4]);
        assert_eq!(kept[2], vec![4.0; 4]);
    }

    fn abundance_setup(steps: Vec<f64>) -> (Array3, ParameterSet, AbundanceConfig) {
        let tensor = tagged_tensor(2, 4, 6);
        let params = ParameterSet::new(
            vec!["Rp".into(), "kappa".into(), "H2O".into(), "CO".into()],
            steps,
        )
        .unwrap();
        let config = AbundanceConfig {
            molfit: vec!["H2O".into(), "CO".into()],
            out_species: "H2-ref H2O_1 CO2_1 CO_2".into(),
            reference: vec![0.85, 1e-4, 1e-6, 1e-3],
        };
        (tensor, params, config)
    }

    #[test]
    fn test_abundance_correction_applied() {
        let (tensor, params, config) = abundance_setup(vec![0.1, 0.0, 0.5, 0.5]);
        let plain = aggregate(&tensor, 2, &params, None).unwrap();
        let corrected = aggregate(&tensor, 2, &params, Some(&config)).unwrap();

        // kappa was fixed, so rows shift down by one after filtering.
        assert_eq!(corrected.names(), &["Rp", "H2O", "CO"]);
        assert_eq!(corrected.samples[0], plain.samples[0]);
        for (a, b) in corrected.samples[1].iter().zip(plain.samples[1].iter()) {
            assert_abs_diff_eq!(*a, b - 4.0, epsilon = 1e-9);
        }
        // "CO_" only matches CO_2: CO2_1 contains "CO2_", not "CO_".
        for (a, b) in corrected.samples[2].iter().zip(plain.samples[2].iter()) {
            assert_abs_diff_eq!(*a, b - 3.0, epsilon = 1e-9);
        }
        let offsets = corrected.correction.unwrap();
        assert_eq!(offsets.offsets().len(), 2);
        assert_eq!(offsets.offsets()[0].0, 2);
    }

    #[test]
    fn test_abundance_correction_skipped_leaves_samples_identical() {
        for steps in vec![vec![0.1, 0.1, 0.0, 0.5], vec![0.1, 0.1, 0.5, -0.5]] {
            let (tensor, params, config) = abundance_setup(steps);
            let plain = aggregate(&tensor, 2, &params, None).unwrap();
            let skipped = aggregate(&tensor, 2, &params, Some(&config)).unwrap();
            assert!(skipped.correction.is_none());
            assert_eq!(skipped.samples, plain.samples);
        }
    }

    #[test]
    fn test_abundance_correction_bad_reference() {
        let (tensor, params, mut config) = abundance_setup(vec![0.1, 0.1, 0.5, 0.5]);
        config.reference.pop();
        assert!(matches!(
            aggregate(&tensor, 0, &params, Some(&config)),
            Err(crate::PlotError::Shape(_))
        ));

        let (tensor, params, mut config) = abundance_setup(vec![0.1, 0.1, 0.5, 0.5]);
        config.molfit[1] = "NH3".into();
        assert!(matches!(
            aggregate(&tensor, 0, &params, Some(&config)),
            Err(crate::PlotError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_aggregate_bookkeeping() {
        let tensor = tagged_tensor(3, 2, 100);
        let params = ParameterSet::new(names(2), vec![1.0, 1.0]).unwrap();
        let agg = aggregate(&tensor, 20, &params, None).unwrap();
        assert_eq!(agg.pooled_len(), 240);
        assert_eq!(agg.boundaries(), vec![80, 160]);
        assert_eq!(agg.samples[0].len(), 240);
    }
}
