use crate::equilibrium::constraint::MacroConstraint;
use crate::equilibrium::oracle::EquilibriumState;
use crate::error::{TracerError, TracerResult};
use serde::{Deserialize, Serialize};

/// The univariant point every branch is seeded from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub fixed: MacroConstraint,
    pub state: EquilibriumState,
}

impl Anchor {
    /// Minor end-member fraction of `phase` at the anchor.
    pub fn minor_fraction(&self, phase: &str) -> TracerResult<f64> {
        self.state
            .phase(phase)
            .map(|p| p.minor_fraction())
            .ok_or_else(|| TracerError::UnknownPhase(phase.to_string()))
    }

    /// Pressure or temperature at the anchor, whichever is not fixed.
    pub fn free_value(&self) -> f64 {
        self.fixed.free_value(&self.state.macro_state())
    }

    pub fn pressure(&self) -> f64 {
        self.state.pressure
    }

    pub fn temperature(&self) -> f64 {
        self.state.temperature
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPoint {
    /// Value of the driving phase composition that was pinned.
    pub sweep_value: f64,
    pub pressure: f64,
    pub temperature: f64,
    pub driving_fraction: f64,
    pub partner_fraction: f64,
}

impl BoundaryPoint {
    pub fn free_value(&self, fixed: &MacroConstraint) -> f64 {
        match fixed {
            MacroConstraint::Pressure(_) => self.temperature,
            MacroConstraint::Temperature(_) => self.pressure,
        }
    }
}

/// One branch of a phase boundary: the driving phase swept in composition,
/// the partner held at zero abundance.
///
/// `attempted` counts every step of the sweep; `points` holds only the
/// converged ones, in sweep order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCurve {
    pub driving: String,
    pub partner: String,
    pub fixed: MacroConstraint,
    pub attempted: usize,
    pub points: Vec<BoundaryPoint>,
}

impl BoundaryCurve {
    pub fn new(driving: &str, partner: &str, fixed: MacroConstraint) -> Self {
        Self {
            driving: driving.to_string(),
            partner: partner.to_string(),
            fixed,
            attempted: 0,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.points.len()
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.driving, self.partner)
    }

    pub fn sweep_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.sweep_value)
    }

    pub fn free_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.free_value(&self.fixed))
    }
}

/// Indices into the anchor assemblage naming one branch, and where it ends.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchSpec {
    pub driving: usize,
    pub partner: usize,
    pub far_endpoint: f64,
}

/// Two compositions in equilibrium at the anchor's macro value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TieLine {
    pub free_value: f64,
    pub low: f64,
    pub high: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseBoundary {
    pub anchor: Anchor,
    pub curves: Vec<BoundaryCurve>,
}

impl PhaseBoundary {
    /// Horizontal (isobaric or isothermal) line spanning the anchor compositions.
    pub fn tie_line(&self) -> TieLine {
        let fractions = self.anchor.state.phases.iter().map(|p| p.minor_fraction());
        let (low, high) = fractions.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
        TieLine { free_value: self.anchor.free_value(), low, high }
    }

    pub fn curve(&self, driving: &str, partner: &str) -> Option<&BoundaryCurve> {
        self.curves.iter().find(|c| c.driving == driving && c.partner == partner)
    }

    pub fn total_points(&self) -> usize {
        self.curves.iter().map(BoundaryCurve::len).sum()
    }
}
