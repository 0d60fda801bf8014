//! Equality constraints pinning the degrees of freedom of one equilibrium solve.

use crate::composition::ExchangeVector;
use crate::constants::MACROSCOPIC_VARIABLES;
use crate::equilibrium::assemblage::Assemblage;
use crate::equilibrium::phase::{MacroState, Phase};
use crate::error::{TracerError, TracerResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The macroscopic variable held fixed for a whole trace.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroConstraint {
    Pressure(f64),
    Temperature(f64),
}

impl MacroConstraint {
    pub fn value(&self) -> f64 {
        match self {
            MacroConstraint::Pressure(p) => *p,
            MacroConstraint::Temperature(t) => *t,
        }
    }

    /// Value of the variable left free by this constraint.
    pub fn free_value(&self, state: &MacroState) -> f64 {
        match self {
            MacroConstraint::Pressure(_) => state.temperature,
            MacroConstraint::Temperature(_) => state.pressure,
        }
    }

    pub fn free_variable_name(&self) -> &'static str {
        match self {
            MacroConstraint::Pressure(_) => "temperature",
            MacroConstraint::Temperature(_) => "pressure",
        }
    }

    /// Overwrite the fixed component of `state` with this constraint's value.
    pub fn apply_to(&self, state: MacroState) -> MacroState {
        match self {
            MacroConstraint::Pressure(p) => MacroState { pressure: *p, ..state },
            MacroConstraint::Temperature(t) => MacroState { temperature: *t, ..state },
        }
    }

    /// State with the fixed variable at this constraint's value and the free one at `free_value`.
    pub fn state_at(&self, free_value: f64) -> MacroState {
        match self {
            MacroConstraint::Pressure(p) => MacroState::new(*p, free_value),
            MacroConstraint::Temperature(t) => MacroState::new(free_value, *t),
        }
    }

    pub fn to_equality(&self) -> EqualityConstraint {
        match self {
            MacroConstraint::Pressure(p) => EqualityConstraint::Pressure(*p),
            MacroConstraint::Temperature(t) => EqualityConstraint::Temperature(*t),
        }
    }
}

impl fmt::Display for MacroConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroConstraint::Pressure(p) => write!(f, "P = {}", p),
            MacroConstraint::Temperature(t) => write!(f, "T = {}", t),
        }
    }
}

/// `sum(numerator[k] * x[species[k]]) / sum(denominator[k] * x[species[k]]) == value`
/// over one phase's end-member fractions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositionRatio {
    pub species: Vec<String>,
    pub numerator: Vec<f64>,
    pub denominator: Vec<f64>,
    pub value: f64,
}

impl CompositionRatio {
    /// Composition linearly interpolated between the pure `major` (x = 0) and
    /// pure `minor` (x = 1) end-members.
    pub fn end_member_fraction(major: &str, minor: &str, x: f64) -> Self {
        Self {
            species: vec![major.to_string(), minor.to_string()],
            numerator: vec![0.0, 1.0],
            denominator: vec![1.0, 1.0],
            value: x,
        }
    }

    fn coefficients_for(&self, phase: &Phase) -> Option<(Vec<f64>, Vec<f64>)> {
        let mut numerator = vec![0.0; phase.species.len()];
        let mut denominator = vec![0.0; phase.species.len()];
        for (k, species) in self.species.iter().enumerate() {
            let index = phase.species_index(species)?;
            numerator[index] += self.numerator[k];
            denominator[index] += self.denominator[k];
        }
        Some((numerator, denominator))
    }

    /// Current value of the ratio for `phase`.
    pub fn evaluate(&self, phase: &Phase) -> Option<f64> {
        let (numerator, denominator) = self.coefficients_for(phase)?;
        let top: f64 = numerator.iter().zip(&phase.molar_fractions).map(|(c, x)| c * x).sum();
        let bottom: f64 = denominator.iter().zip(&phase.molar_fractions).map(|(c, x)| c * x).sum();
        if bottom == 0.0 { None } else { Some(top / bottom) }
    }

    /// Minor fraction `x` of a binary `phase` at which the ratio equals `value`.
    pub fn solve_binary(&self, phase: &Phase) -> Option<f64> {
        if phase.species.len() != 2 {
            return None;
        }
        let (n, d) = self.coefficients_for(phase)?;
        // value * (d0 + (d1 - d0) x) = n0 + (n1 - n0) x
        let slope = (n[1] - n[0]) - self.value * (d[1] - d[0]);
        if slope.abs() < f64::EPSILON {
            return None;
        }
        Some((self.value * d[0] - n[0]) / slope)
    }
}

/// One pinned degree of freedom.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityConstraint {
    Pressure(f64),
    Temperature(f64),
    PhaseFraction { phase: String, value: f64 },
    PhaseComposition { phase: String, ratio: CompositionRatio },
}

impl EqualityConstraint {
    pub fn phase_fraction(phase: &str, value: f64) -> Self {
        EqualityConstraint::PhaseFraction { phase: phase.to_string(), value }
    }

    pub fn phase_composition(phase: &str, ratio: CompositionRatio) -> Self {
        EqualityConstraint::PhaseComposition { phase: phase.to_string(), ratio }
    }
}

/// Check a constraint set against the assemblage before it reaches the oracle.
///
/// The count must equal the two macroscopic variables plus one per free
/// compositional vector, every referenced phase must exist, and no
/// macroscopic variable may be pinned twice.
pub fn validate_constraints(
    assemblage: &Assemblage,
    constraints: &[EqualityConstraint],
    free_vectors: &[ExchangeVector],
) -> TracerResult<()> {
    let expected = MACROSCOPIC_VARIABLES + free_vectors.len();
    if constraints.len() != expected {
        return Err(TracerError::ConstraintCount { expected, found: constraints.len() });
    }

    let mut pressures = 0;
    let mut temperatures = 0;
    for constraint in constraints {
        match constraint {
            EqualityConstraint::Pressure(p) => {
                pressures += 1;
                if !p.is_finite() {
                    return Err(TracerError::Config(format!("pressure {} is not finite", p)));
                }
            }
            EqualityConstraint::Temperature(t) => {
                temperatures += 1;
                if !t.is_finite() || *t <= 0.0 {
                    return Err(TracerError::Config(format!("temperature {} must be positive", t)));
                }
            }
            EqualityConstraint::PhaseFraction { phase, value } => {
                assemblage.index_of(phase)?;
                if !(0.0..=1.0).contains(value) {
                    return Err(TracerError::Config(format!(
                        "phase fraction {} for {} is outside [0, 1]",
                        value, phase
                    )));
                }
            }
            EqualityConstraint::PhaseComposition { phase, ratio } => {
                let target = assemblage.phase(phase)?;
                if ratio.species.len() != ratio.numerator.len()
                    || ratio.species.len() != ratio.denominator.len()
                {
                    return Err(TracerError::Config(format!(
                        "composition constraint on {} has mismatched coefficient lengths",
                        phase
                    )));
                }
                if let Some(missing) = ratio.species.iter().find(|s| target.species_index(s).is_none()) {
                    return Err(TracerError::InvalidComposition(format!(
                        "{} has no site species {}",
                        phase, missing
                    )));
                }
                if !ratio.value.is_finite() {
                    return Err(TracerError::Config(format!(
                        "composition constraint on {} is not finite",
                        phase
                    )));
                }
            }
        }
    }
    if pressures > 1 || temperatures > 1 {
        return Err(TracerError::Config("a macroscopic variable is constrained twice".into()));
    }
    Ok(())
}
