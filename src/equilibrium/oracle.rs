use crate::composition::{Composition, ExchangeVector};
use crate::equilibrium::assemblage::Assemblage;
use crate::equilibrium::constraint::EqualityConstraint;
use crate::equilibrium::phase::MacroState;
use serde::{Deserialize, Serialize};

/// Anything that can solve for chemical equilibrium under equality constraints.
///
/// Implementations must be deterministic for identical inputs and must report
/// a non-converging solve as `Solution::NotConverged`; near the ends of a
/// phase boundary that is an ordinary outcome.
pub trait EquilibriumOracle {
    fn solve(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        constraints: &[EqualityConstraint],
        free_vectors: &[ExchangeVector],
    ) -> Solution;
}

impl<O: EquilibriumOracle + ?Sized> EquilibriumOracle for &O {
    fn solve(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        constraints: &[EqualityConstraint],
        free_vectors: &[ExchangeVector],
    ) -> Solution {
        (**self).solve(bulk, assemblage, constraints, free_vectors)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    pub name: String,
    pub fraction: f64,
    pub molar_fractions: Vec<f64>,
}

impl PhaseState {
    pub fn minor_fraction(&self) -> f64 {
        self.molar_fractions.last().copied().unwrap_or(0.0)
    }
}

/// A converged equilibrium.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumState {
    pub pressure: f64,
    pub temperature: f64,
    pub phases: Vec<PhaseState>,
    /// Bulk composition after any shift along the free compositional vectors.
    pub bulk: Composition,
    pub iterations: usize,
}

impl EquilibriumState {
    pub fn macro_state(&self) -> MacroState {
        MacroState::new(self.pressure, self.temperature)
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseState> {
        self.phases.iter().find(|p| p.name == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Solution {
    Converged(EquilibriumState),
    NotConverged { iterations: usize, reason: String },
}

impl Solution {
    pub fn failed(reason: impl Into<String>) -> Self {
        Solution::NotConverged { iterations: 0, reason: reason.into() }
    }

    pub fn success(&self) -> bool {
        matches!(self, Solution::Converged(_))
    }

    pub fn state(&self) -> Option<&EquilibriumState> {
        match self {
            Solution::Converged(state) => Some(state),
            Solution::NotConverged { .. } => None,
        }
    }

    pub fn into_state(self) -> Option<EquilibriumState> {
        match self {
            Solution::Converged(state) => Some(state),
            Solution::NotConverged { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Solution::Converged(_) => None,
            Solution::NotConverged { reason, .. } => Some(reason),
        }
    }
}
