//! A Rust library that turns raw MCMC sampling output into diagnostic figures:
//! per-parameter trace plots, pairwise posterior grids, marginal histograms,
//! RMS-vs-bin-size curves, and binned model fits.
//!
//! The library reduces a (chain, parameter, iteration) sample array to a
//! display-ready matrix of free parameters and lays out the panel grid for any
//! number of parameters.  Drawing itself goes through the [`canvas::Canvas`]
//! trait; [`svg::SvgCanvas`] is a self-contained SVG implementation.
//!
//! ```no_run
//! use mcplots::pipeline::{plot_source, PipelineConfig};
//! use mcplots::{loader::NpyFile, svg::SvgCanvas, ParameterSet};
//!
//! # fn main() -> mcplots::Result<()> {
//! let params = ParameterSet::new(
//!     vec!["kappa".into(), "g1".into(), "H2O".into()],
//!     vec![0.1, 0.0, 0.5],
//! )?;
//! let config = PipelineConfig {
//!     burnin: 1000,
//!     output_dir: "plots".into(),
//!     ..Default::default()
//! };
//! let mut canvas = SvgCanvas::new();
//! plot_source(&NpyFile::new("output.npy"), &params, &config, &mut canvas)?;
//! # Ok(())
//! # }
//! ```
#[cfg(test)]
#[macro_use]
extern crate approx;

/// Binning collaborator used by the model-fit figure
pub mod binning;
/// Drawing capability the renderers call into
pub mod canvas;
/// Chain stacking, abundance correction and free-parameter filtering
pub mod chains;
/// Colors and colormaps
pub mod color;
pub mod error;
/// Marginal posterior histograms
pub mod histogram;
/// Panel grid geometry, tick generation and tick reduction
pub mod layout;
/// Sources of persisted sample arrays
pub mod loader;
/// Binned data and model with residuals
pub mod modelfit;
/// Display names for parameters
pub mod names;
/// Pairwise posterior grids
pub mod pairwise;
/// Load, reduce and draw trace, pairwise and histogram figures in one call
pub mod pipeline;
/// RMS vs bin size
pub mod rms;
/// SVG backend for [`canvas::Canvas`]
pub mod svg;
/// Per-parameter trace plots
pub mod trace;
/// Thinning, extents, histograms and a lightweight CSV reader
pub mod utils;

#[cfg(test)]
pub(crate) mod recorder;

pub use chains::{AggregatedChains, ParameterSet};
pub use error::{PlotError, Result};

/// One-dimensional vector of numeric values
pub type Array1 = Vec<f64>;
/// Two dimensional vector of vectors of numeric values
pub type Array2 = Vec<Array1>;
/// Three dimensional sample tensor indexed as `[chain][parameter][iteration]`
pub type Array3 = Vec<Array2>;

/// What a renderer did with its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A figure with this many data panels was drawn (and saved when a path
    /// was configured).
    Drawn { panels: usize },
    /// Nothing to draw; the canvas was not touched.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoParameters,
    NothingToPair,
    TooFewBinSizes,
}

impl Outcome {
    pub fn panels(&self) -> usize {
        match self {
            Outcome::Drawn { panels } => *panels,
            Outcome::Skipped(_) => 0,
        }
    }
}
