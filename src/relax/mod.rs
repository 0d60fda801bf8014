// Structure relaxation under hydrostatic pressure
pub mod cell_filter;
pub mod fire;
pub mod potential;
pub mod structure;

pub use cell_filter::UnitCellFilter;
pub use fire::FireParams;
pub use potential::{EnergyEvaluator, Evaluation, LennardJones};
pub use structure::{CrystalKind, Structure};

use crate::constants::{DEFAULT_FMAX_EV_PER_A, DEFAULT_MAX_RELAX_STEPS, EV_PER_A3_TO_GPA};
use crate::error::RelaxResult;
use glam::{DMat3, DVec3};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RelaxParams {
    /// Convergence threshold on the largest generalized force (eV/Å)
    pub fmax: f64,
    pub max_iterations: usize,
    pub fire: FireParams,
}

impl Default for RelaxParams {
    fn default() -> Self {
        Self {
            fmax: DEFAULT_FMAX_EV_PER_A,
            max_iterations: DEFAULT_MAX_RELAX_STEPS,
            fire: FireParams::default(),
        }
    }
}

/// Relaxed structure with its energy, forces and stress.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelaxationReport {
    pub structure: Structure,
    /// eV
    pub energy: f64,
    pub energy_per_atom: f64,
    /// `E + P V` at the target pressure (eV)
    pub enthalpy: f64,
    pub forces: Vec<DVec3>,
    /// eV/Å³, positive is tensile
    pub stress: DMat3,
    /// Hydrostatic pressure of the relaxed cell (GPa)
    pub pressure: f64,
    pub iterations: usize,
}

impl RelaxationReport {
    pub fn stress_gpa(&self) -> DMat3 {
        self.stress * EV_PER_A3_TO_GPA
    }

    pub fn fmax(&self) -> f64 {
        self.forces.iter().map(|f| f.length()).fold(0.0, f64::max)
    }

    pub fn volume_per_atom(&self) -> f64 {
        self.structure.volume_per_atom()
    }
}

/// Relax atom positions and the cell together at `pressure_gpa`.
pub fn relax_under_pressure<E: EnergyEvaluator>(
    structure: &Structure,
    evaluator: E,
    pressure_gpa: f64,
    params: &RelaxParams,
) -> RelaxResult<RelaxationReport> {
    let filter = UnitCellFilter::new(evaluator, structure.clone(), pressure_gpa)?;
    let output = fire::minimize(
        &params.fire,
        filter.initial_coordinates(),
        params.fmax,
        params.max_iterations,
        |x| {
            let evaluated = filter.evaluate(x)?;
            Ok((evaluated.enthalpy, evaluated.forces))
        },
    )?;

    let relaxed = filter.evaluate(&output.position)?;
    let pressure = relaxed.evaluation.pressure() * EV_PER_A3_TO_GPA;
    info!(
        "relaxed {} atoms at {:.2} GPa in {} steps: V/atom = {:.4} Å³, P = {:.3} GPa",
        relaxed.structure.len(),
        pressure_gpa,
        output.iterations,
        relaxed.structure.volume_per_atom(),
        pressure
    );

    let n = relaxed.structure.len() as f64;
    Ok(RelaxationReport {
        energy: relaxed.evaluation.energy,
        energy_per_atom: relaxed.evaluation.energy / n,
        enthalpy: relaxed.enthalpy,
        forces: relaxed.evaluation.forces,
        stress: relaxed.evaluation.stress,
        pressure,
        iterations: output.iterations,
        structure: relaxed.structure,
    })
}
