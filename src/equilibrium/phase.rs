use crate::error::{TracerError, TracerResult};
use serde::{Deserialize, Serialize};

/// Pressure and temperature of an assemblage, in the oracle's units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MacroState {
    pub pressure: f64,
    pub temperature: f64,
}

impl MacroState {
    pub fn new(pressure: f64, temperature: f64) -> Self {
        Self { pressure, temperature }
    }
}

/// A solid-solution phase: a name, the species sharing its mixing site, and
/// the molar fraction of each end-member.
///
/// Binary phases use `species = [major, minor]` and `molar_fractions = [1 - x, x]`,
/// so `minor_fraction()` is the value swept along a phase boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub species: Vec<String>,
    pub molar_fractions: Vec<f64>,
}

impl Phase {
    pub fn new(name: &str, species: &[&str], molar_fractions: Vec<f64>) -> TracerResult<Self> {
        let phase = Self {
            name: name.to_string(),
            species: species.iter().map(|s| s.to_string()).collect(),
            molar_fractions,
        };
        phase.validate()?;
        Ok(phase)
    }

    /// Binary phase with composition `[1 - x, x]`.
    pub fn binary(name: &str, major: &str, minor: &str, x: f64) -> TracerResult<Self> {
        Self::new(name, &[major, minor], vec![1.0 - x, x])
    }

    pub fn validate(&self) -> TracerResult<()> {
        if self.species.is_empty() {
            return Err(TracerError::InvalidComposition(format!(
                "phase {} has no site species",
                self.name
            )));
        }
        if self.species.len() != self.molar_fractions.len() {
            return Err(TracerError::InvalidComposition(format!(
                "phase {} has {} species but {} molar fractions",
                self.name,
                self.species.len(),
                self.molar_fractions.len()
            )));
        }
        if self.molar_fractions.iter().any(|x| !x.is_finite() || *x < 0.0 || *x > 1.0) {
            return Err(TracerError::InvalidComposition(format!(
                "phase {} has molar fractions outside [0, 1]: {:?}",
                self.name, self.molar_fractions
            )));
        }
        let sum: f64 = self.molar_fractions.iter().sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(TracerError::InvalidComposition(format!(
                "phase {} molar fractions sum to {}",
                self.name, sum
            )));
        }
        Ok(())
    }

    pub fn species_index(&self, species: &str) -> Option<usize> {
        self.species.iter().position(|s| s == species)
    }

    /// Molar fraction of the last end-member (Fe in an `[Mg, Fe]` phase).
    pub fn minor_fraction(&self) -> f64 {
        self.molar_fractions.last().copied().unwrap_or(0.0)
    }

    /// Same phase with its composition replaced by `[1 - x, x]`.
    pub fn with_minor_fraction(&self, x: f64) -> TracerResult<Self> {
        if self.species.len() != 2 {
            return Err(TracerError::InvalidComposition(format!(
                "phase {} is not a binary solution",
                self.name
            )));
        }
        let mut phase = self.clone();
        phase.molar_fractions = vec![1.0 - x, x];
        phase.validate()?;
        Ok(phase)
    }
}
