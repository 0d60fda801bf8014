use crate::constants::FRACTION_SUM_TOLERANCE;
use crate::equilibrium::phase::{MacroState, Phase};
use crate::error::{TracerError, TracerResult};

/// Proposed equilibrium state handed to the oracle: ordered phases, their
/// fractions, and a pressure/temperature starting guess.
///
/// A fresh assemblage is built for every solve. The oracle only reads it, so
/// the phase compositions and `hint` act as a solver starting guess and never
/// leak between calls.
#[derive(Clone, Debug, PartialEq)]
pub struct Assemblage {
    pub phases: Vec<Phase>,
    pub fractions: Vec<f64>,
    pub hint: MacroState,
}

impl Assemblage {
    pub fn new(phases: Vec<Phase>, fractions: Vec<f64>, hint: MacroState) -> TracerResult<Self> {
        let assemblage = Self { phases, fractions, hint };
        assemblage.validate()?;
        Ok(assemblage)
    }

    pub fn validate(&self) -> TracerResult<()> {
        if self.phases.is_empty() {
            return Err(TracerError::InvalidAssemblage("no phases".into()));
        }
        if self.phases.len() != self.fractions.len() {
            return Err(TracerError::InvalidAssemblage(format!(
                "{} phases but {} fractions",
                self.phases.len(),
                self.fractions.len()
            )));
        }
        for (i, phase) in self.phases.iter().enumerate() {
            phase.validate()?;
            if self.phases[..i].iter().any(|p| p.name == phase.name) {
                return Err(TracerError::InvalidAssemblage(format!(
                    "phase {} appears twice",
                    phase.name
                )));
            }
        }
        if self.fractions.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(TracerError::InvalidAssemblage(format!(
                "phase fractions must be non-negative: {:?}",
                self.fractions
            )));
        }
        let sum: f64 = self.fractions.iter().sum();
        if (sum - 1.0).abs() > FRACTION_SUM_TOLERANCE {
            return Err(TracerError::InvalidAssemblage(format!(
                "phase fractions sum to {}, expected 1",
                sum
            )));
        }
        if !self.hint.pressure.is_finite() || !self.hint.temperature.is_finite() {
            return Err(TracerError::InvalidAssemblage("non-finite starting state".into()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn index_of(&self, name: &str) -> TracerResult<usize> {
        self.phases
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| TracerError::UnknownPhase(name.to_string()))
    }

    pub fn phase(&self, name: &str) -> TracerResult<&Phase> {
        self.index_of(name).map(|i| &self.phases[i])
    }

    pub fn names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> Vec<Phase> {
        vec![
            Phase::binary("periclase", "Mg", "Fe", 0.5).unwrap(),
            Phase::binary("wuestite", "Mg", "Fe", 0.5).unwrap(),
        ]
    }

    #[test]
    fn test_valid_assemblage() {
        let a = Assemblage::new(pair(), vec![0.5, 0.5], MacroState::new(200.0, 2500.0)).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.index_of("wuestite").unwrap(), 1);
        assert!(matches!(a.index_of("olivine"), Err(TracerError::UnknownPhase(_))));
        assert_eq!(a.names(), vec!["periclase", "wuestite"]);
    }

    #[test]
    fn test_fraction_checks() {
        let hint = MacroState::new(200.0, 2500.0);
        assert!(Assemblage::new(pair(), vec![0.5, 0.6], hint).is_err());
        assert!(Assemblage::new(pair(), vec![1.5, -0.5], hint).is_err());
        assert!(Assemblage::new(pair(), vec![1.0], hint).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let per = Phase::binary("periclase", "Mg", "Fe", 0.5).unwrap();
        let result = Assemblage::new(vec![per.clone(), per], vec![0.5, 0.5], MacroState::new(0.0, 1.0));
        assert!(matches!(result, Err(TracerError::InvalidAssemblage(_))));
    }
}
