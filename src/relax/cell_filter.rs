//! Combined atom + cell coordinates for relaxing a structure at fixed pressure.
//!
//! The cell is written as `cell = F * cell_ref` for a deformation gradient
//! `F`. The generalized coordinates are the atom positions mapped back into
//! the reference frame, `u = F⁻¹ r`, followed by the three columns of
//! `cell_factor * F`. The function minimized is the enthalpy `E + P V`, with
//! generalized forces
//!
//! - atoms: `Fᵀ f`
//! - cell: `W F⁻ᵀ / cell_factor` where the virial is `W = -V (σ + P I)`.

use crate::constants::GPA_TO_EV_PER_A3;
use crate::error::{RelaxError, RelaxResult};
use crate::relax::potential::{EnergyEvaluator, Evaluation};
use crate::relax::structure::Structure;
use glam::{DMat3, DVec3};

pub struct UnitCellFilter<E> {
    evaluator: E,
    reference: Structure,
    /// Target pressure in eV/Å³
    pressure: f64,
    cell_factor: f64,
}

/// Evaluation of the filtered system at one set of generalized coordinates.
#[derive(Clone, Debug)]
pub struct FilterEvaluation {
    pub structure: Structure,
    pub evaluation: Evaluation,
    /// `E + P V` in eV
    pub enthalpy: f64,
    pub forces: Vec<DVec3>,
}

impl FilterEvaluation {
    pub fn fmax(&self) -> f64 {
        self.forces.iter().map(|f| f.length()).fold(0.0, f64::max)
    }
}

impl<E: EnergyEvaluator> UnitCellFilter<E> {
    /// `pressure_gpa` is the target hydrostatic pressure.
    pub fn new(evaluator: E, structure: Structure, pressure_gpa: f64) -> RelaxResult<Self> {
        structure.validate()?;
        if !pressure_gpa.is_finite() {
            return Err(RelaxError::Config(format!("pressure {} is not finite", pressure_gpa)));
        }
        let cell_factor = structure.len() as f64;
        Ok(Self {
            evaluator,
            reference: structure,
            pressure: pressure_gpa * GPA_TO_EV_PER_A3,
            cell_factor,
        })
    }

    pub fn reference(&self) -> &Structure {
        &self.reference
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    /// Coordinates of the reference structure (`F = I`).
    pub fn initial_coordinates(&self) -> Vec<DVec3> {
        let mut coordinates = self.reference.positions.clone();
        let scaled = DMat3::IDENTITY * self.cell_factor;
        coordinates.extend([scaled.x_axis, scaled.y_axis, scaled.z_axis]);
        coordinates
    }

    fn deformation(&self, coordinates: &[DVec3]) -> RelaxResult<DMat3> {
        let n = self.reference.len();
        if coordinates.len() != n + 3 {
            return Err(RelaxError::Config(format!(
                "expected {} generalized coordinates, got {}",
                n + 3,
                coordinates.len()
            )));
        }
        let deformation =
            DMat3::from_cols(coordinates[n], coordinates[n + 1], coordinates[n + 2]) * (1.0 / self.cell_factor);
        let det = deformation.determinant();
        if !det.is_finite() || det <= 0.0 {
            return Err(RelaxError::SingularCell { volume: det * self.reference.volume() });
        }
        Ok(deformation)
    }

    /// The physical structure described by `coordinates`.
    pub fn structure_at(&self, coordinates: &[DVec3]) -> RelaxResult<Structure> {
        let deformation = self.deformation(coordinates)?;
        let n = self.reference.len();
        Structure::new(
            deformation * self.reference.cell,
            coordinates[..n].iter().map(|u| deformation * *u).collect(),
            self.reference.symbols.clone(),
        )
    }

    pub fn evaluate(&self, coordinates: &[DVec3]) -> RelaxResult<FilterEvaluation> {
        let deformation = self.deformation(coordinates)?;
        let structure = self.structure_at(coordinates)?;
        let evaluation = self.evaluator.evaluate(&structure)?;
        let volume = structure.volume();

        let transpose = deformation.transpose();
        let mut forces: Vec<DVec3> = evaluation.forces.iter().map(|f| transpose * *f).collect();

        let virial = (evaluation.stress + DMat3::IDENTITY * self.pressure) * -volume;
        let cell_force = virial * deformation.inverse().transpose() * (1.0 / self.cell_factor);
        forces.extend([cell_force.x_axis, cell_force.y_axis, cell_force.z_axis]);

        Ok(FilterEvaluation {
            enthalpy: evaluation.energy + self.pressure * volume,
            structure,
            evaluation,
            forces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relax::potential::LennardJones;
    use crate::relax::structure::CrystalKind;
    use approx::assert_abs_diff_eq;

    fn filter(pressure_gpa: f64) -> UnitCellFilter<LennardJones> {
        let lj = LennardJones::with_default_cutoff(0.4093, 2.338).unwrap();
        let mut structure = Structure::bulk_cubic("Cu", CrystalKind::Fcc, 3.7).unwrap();
        structure.positions[1] += DVec3::new(0.05, -0.03, 0.02);
        UnitCellFilter::new(lj, structure, pressure_gpa).unwrap()
    }

    #[test]
    fn test_identity_coordinates_reproduce_reference() {
        let filter = filter(0.0);
        let structure = filter.structure_at(&filter.initial_coordinates()).unwrap();
        assert_abs_diff_eq!(structure.volume(), filter.reference().volume(), epsilon = 1e-10);
        assert_eq!(structure.positions, filter.reference().positions);
    }

    #[test]
    fn test_generalized_forces_match_finite_differences() {
        let filter = filter(10.0);
        let mut x = filter.initial_coordinates();
        // strain the cell a little so the cell block is not at the identity
        x[4].y += 0.02;
        x[5].x -= 0.01;
        let analytic = filter.evaluate(&x).unwrap().forces;

        let h = 1e-5;
        for k in [1, 4, 5, 6] {
            for axis in 0..3 {
                let mut plus = x.clone();
                let mut minus = x.clone();
                plus[k][axis] += h;
                minus[k][axis] -= h;
                let numeric = -(filter.evaluate(&plus).unwrap().enthalpy
                    - filter.evaluate(&minus).unwrap().enthalpy)
                    / (2.0 * h);
                assert_abs_diff_eq!(analytic[k][axis], numeric, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_rejects_inverted_cell() {
        let filter = filter(0.0);
        let mut x = filter.initial_coordinates();
        let n = filter.reference().len();
        x[n] = -x[n];
        assert!(matches!(filter.structure_at(&x), Err(RelaxError::SingularCell { .. })));
    }
}
