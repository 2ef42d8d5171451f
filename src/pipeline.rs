use crate::canvas::Canvas;
use crate::chains::{aggregate, AbundanceConfig, AggregatedChains, ParameterSet};
use crate::error::Result;
use crate::histogram::{histogram, HistogramConfig};
use crate::layout::PairStyle;
use crate::loader::SampleSource;
use crate::names::NameFormatter;
use crate::pairwise::{pairwise, PairwiseConfig};
use crate::trace::{trace, TraceConfig};
use crate::utils::check_thinning;
use crate::{Array3, Outcome};
use log::info;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// File names of the three figures inside the output directory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputNames {
    pub trace: String,
    pub pairwise: String,
    pub histogram: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            trace: "trace.svg".to_string(),
            pairwise: "pairwise.svg".to_string(),
            histogram: "histogram.svg".to_string(),
        }
    }
}

/// Settings for a full run over one set of chains.  Every field has a
/// default, so a JSON file only needs the ones it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Leading iterations dropped from every chain.
    pub burnin: usize,
    pub thinning: usize,
    /// Title shown on each figure.
    pub title: Option<String>,
    /// Directory the figures are written to; created when missing.
    pub output_dir: PathBuf,
    pub file_names: OutputNames,
    /// Molar-fraction correction of the fitted abundances.
    pub abundance: Option<AbundanceConfig>,
    pub pair_style: PairStyle,
    pub formatter: NameFormatter,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            burnin: 0,
            thinning: 1,
            title: None,
            output_dir: PathBuf::from("."),
            file_names: OutputNames::default(),
            abundance: None,
            pair_style: PairStyle::Hist,
            formatter: NameFormatter::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// What a full run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub chains: AggregatedChains,
    pub trace: Outcome,
    pub pairwise: Outcome,
    pub histogram: Outcome,
    /// Figures written, in drawing order.
    pub files: Vec<PathBuf>,
}

/// Reduces the chains and draws the trace, pairwise and histogram figures
/// into `config.output_dir`, in that order.
///
/// Nothing is drawn when the tensor or parameter set is malformed.
pub fn plot_chains(
    tensor: &Array3,
    params: &ParameterSet,
    config: &PipelineConfig,
    canvas: &mut dyn Canvas,
) -> Result<PipelineReport> {
    check_thinning(config.thinning)?;
    let chains = aggregate(tensor, config.burnin, params, config.abundance.as_ref())?;
    fs::create_dir_all(&config.output_dir)?;

    let names = chains.names();
    let out = |name: &str| config.output_dir.join(name);
    let trace_path = out(&config.file_names.trace);
    let pairwise_path = out(&config.file_names.pairwise);
    let histogram_path = out(&config.file_names.histogram);

    let trace_outcome = trace(
        canvas,
        &chains.samples,
        Some(names),
        &TraceConfig {
            title: config.title.clone(),
            thinning: config.thinning,
            chain_len: Some(chains.chain_len),
            save_path: Some(trace_path.clone()),
            formatter: config.formatter.clone(),
        },
    )?;
    let pairwise_outcome = pairwise(
        canvas,
        &chains.samples,
        Some(names),
        &PairwiseConfig {
            title: config.title.clone(),
            thinning: config.thinning,
            style: config.pair_style,
            save_path: Some(pairwise_path.clone()),
            formatter: config.formatter.clone(),
        },
    )?;
    let histogram_outcome = histogram(
        canvas,
        &chains.samples,
        Some(names),
        &HistogramConfig {
            title: config.title.clone(),
            thinning: config.thinning,
            save_path: Some(histogram_path.clone()),
            formatter: config.formatter.clone(),
        },
    )?;

    let files: Vec<PathBuf> = vec![
        (trace_outcome, trace_path),
        (pairwise_outcome, pairwise_path),
        (histogram_outcome, histogram_path),
    ]
    .into_iter()
    .filter(|(outcome, _)| matches!(outcome, Outcome::Drawn { .. }))
    .map(|(_, path)| path)
    .collect();
    info!(
        "plotted {} free parameters from {} chains into {} figures",
        chains.params.len(),
        chains.chains,
        files.len()
    );

    Ok(PipelineReport {
        chains,
        trace: trace_outcome,
        pairwise: pairwise_outcome,
        histogram: histogram_outcome,
        files,
    })
}

/// Loads the chains from `source`, then runs [`plot_chains`].
pub fn plot_source(
    source: &dyn SampleSource,
    params: &ParameterSet,
    config: &PipelineConfig,
    canvas: &mut dyn Canvas,
) -> Result<PipelineReport> {
    let tensor = source.load()?;
    plot_chains(&tensor, params, config, canvas)
}
