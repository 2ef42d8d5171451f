use serde::Deserialize;
use std::collections::BTreeSet;

/// Species whose formula digits get subscripted by default.
pub const DEFAULT_SPECIES: [&str; 17] = [
    "H2O", "CO2", "CH4", "C2H2", "C2H4", "C2H6", "H2", "NH3", "H2S", "NO2", "N2O", "H2O2", "CH3OH",
    "H2CO", "HNO3", "N2", "O2",
];

const KAPPA: &str = "\u{03ba}";
const GAMMA_1: &str = "\u{03b3}\u{2081}";
const GAMMA_2: &str = "\u{03b3}\u{2082}";
const ALPHA: &str = "\u{03b1}";
const BETA: &str = "\u{03b2}";
const PLANET_RADIUS: &str = "R\u{209a}";

/// Rewrites raw parameter identifiers into display labels.
///
/// Rules are tried in order and the first one that applies wins:
/// `kappa` anywhere, `g1`/`g2` anywhere, exact `alpha`/`beta`, exact
/// `Rp`/`R_p`, exact species formula.  Anything else is left alone.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NameFormatter {
    /// Molecular species whose digits 2, 3, 4 and 6 are subscripted.
    pub species: BTreeSet<String>,
}

impl Default for NameFormatter {
    fn default() -> Self {
        Self::with_species(DEFAULT_SPECIES.iter().copied())
    }
}

impl NameFormatter {
    pub fn with_species<I, S>(species: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            species: species.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds a species to the subscripting set.
    pub fn add_species(&mut self, species: impl Into<String>) {
        self.species.insert(species.into());
    }

    pub fn format(&self, name: &str) -> String {
        if name.contains("kappa") {
            name.replace("kappa", KAPPA)
        } else if name.contains("g1") {
            name.replace("g1", GAMMA_1)
        } else if name.contains("g2") {
            name.replace("g2", GAMMA_2)
        } else if name == "alpha" {
            ALPHA.to_string()
        } else if name == "beta" {
            BETA.to_string()
        } else if name == "Rp" || name == "R_p" {
            PLANET_RADIUS.to_string()
        } else if self.species.contains(name) {
            name.chars().map(subscript_digit).collect()
        } else {
            name.to_string()
        }
    }

    /// Formats every name, keeping length and order.
    pub fn format_all<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        names.iter().map(|n| self.format(n.as_ref())).collect()
    }
}

fn subscript_digit(c: char) -> char {
    match c {
        '2' => '\u{2082}',
        '3' => '\u{2083}',
        '4' => '\u{2084}',
        '6' => '\u{2086}',
        other => other,
    }
}

/// Placeholder names `P0, P1, ...`, zero-padded so they sort in order.
pub fn default_names(count: usize) -> Vec<String> {
    let largest = count.saturating_sub(1).max(1) as f64;
    let width = (1.0 + largest.log10()) as usize;
    (0..count)
        .map(|i| format!("P{:0width$}", i, width = width))
        .collect()
}

/// The given names when present, otherwise [`default_names`].
pub(crate) fn resolve_names(names: Option<&[String]>, count: usize) -> Vec<String> {
    match names {
        Some(names) => names.to_vec(),
        None => default_names(count),
    }
}
