//! Energy, force and stress evaluators for periodic structures.

use crate::error::{RelaxError, RelaxResult};
use crate::relax::structure::Structure;
use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

/// Result of one evaluation, in eV and Å.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub energy: f64,
    pub forces: Vec<DVec3>,
    /// `(1/V) dE/dε` in eV/Å³; positive is tensile.
    pub stress: DMat3,
}

impl Evaluation {
    /// Largest force magnitude.
    pub fn fmax(&self) -> f64 {
        self.forces.iter().map(|f| f.length()).fold(0.0, f64::max)
    }

    /// Hydrostatic pressure `-tr(σ)/3` in eV/Å³.
    pub fn pressure(&self) -> f64 {
        -(self.stress.x_axis.x + self.stress.y_axis.y + self.stress.z_axis.z) / 3.0
    }
}

/// Anything that can price a structure.
pub trait EnergyEvaluator {
    fn evaluate(&self, structure: &Structure) -> RelaxResult<Evaluation>;
}

impl<E: EnergyEvaluator + ?Sized> EnergyEvaluator for &E {
    fn evaluate(&self, structure: &Structure) -> RelaxResult<Evaluation> {
        (**self).evaluate(structure)
    }
}

/// Force-shifted Lennard-Jones pair potential.
///
/// Both the energy and the force go smoothly to zero at `cutoff`, so the
/// energy surface seen by the optimizer stays continuous when neighbours
/// cross the cutoff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LennardJones {
    /// Well depth (eV)
    pub epsilon: f64,
    /// Zero crossing distance (Å)
    pub sigma: f64,
    pub cutoff: f64,
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64, cutoff: f64) -> RelaxResult<Self> {
        if !(epsilon > 0.0 && sigma > 0.0 && cutoff > sigma) {
            return Err(RelaxError::Config(format!(
                "invalid Lennard-Jones parameters: epsilon {}, sigma {}, cutoff {}",
                epsilon, sigma, cutoff
            )));
        }
        Ok(Self { epsilon, sigma, cutoff })
    }

    /// Cutoff at three times `sigma`.
    pub fn with_default_cutoff(epsilon: f64, sigma: f64) -> RelaxResult<Self> {
        Self::new(epsilon, sigma, 3.0 * sigma)
    }

    fn raw_energy(&self, r: f64) -> f64 {
        let s6 = (self.sigma / r).powi(6);
        4.0 * self.epsilon * (s6 * s6 - s6)
    }

    fn raw_derivative(&self, r: f64) -> f64 {
        let s6 = (self.sigma / r).powi(6);
        24.0 * self.epsilon * (s6 - 2.0 * s6 * s6) / r
    }

    /// Shifted pair energy; zero beyond the cutoff.
    pub fn pair_energy(&self, r: f64) -> f64 {
        if r >= self.cutoff {
            return 0.0;
        }
        let rc = self.cutoff;
        self.raw_energy(r) - self.raw_energy(rc) - (r - rc) * self.raw_derivative(rc)
    }

    /// `d(pair_energy)/dr`; zero beyond the cutoff.
    pub fn pair_derivative(&self, r: f64) -> f64 {
        if r >= self.cutoff {
            return 0.0;
        }
        self.raw_derivative(r) - self.raw_derivative(self.cutoff)
    }

    /// Number of periodic images needed along each lattice vector.
    fn image_range(&self, structure: &Structure) -> [i32; 3] {
        let inverse = structure.cell.inverse();
        // rows of the inverse are the reciprocal vectors (without 2π)
        [0, 1, 2].map(|i| (self.cutoff * inverse.row(i).length() + 0.5).ceil() as i32)
    }
}

impl EnergyEvaluator for LennardJones {
    fn evaluate(&self, structure: &Structure) -> RelaxResult<Evaluation> {
        structure.validate()?;
        let cell = structure.cell;
        let inverse = cell.inverse();
        let [na, nb, nc] = self.image_range(structure);
        let n = structure.len();

        let mut energy = 0.0;
        let mut forces = vec![DVec3::ZERO; n];
        let mut virial = DMat3::ZERO;

        for i in 0..n {
            for j in 0..n {
                // minimum-image offset in fractional coordinates
                let mut frac = inverse * (structure.positions[j] - structure.positions[i]);
                frac -= frac.round();
                let base = cell * frac;

                for a in -na..=na {
                    for b in -nb..=nb {
                        for c in -nc..=nc {
                            let d = base + cell * DVec3::new(a as f64, b as f64, c as f64);
                            let r = d.length();
                            if r >= self.cutoff || r < 1e-12 {
                                continue;
                            }
                            let dphi = self.pair_derivative(r);
                            energy += 0.5 * self.pair_energy(r);
                            forces[i] += dphi * d / r;
                            // outer product d ⊗ d scaled; columns hold d * d_b
                            let scale = 0.5 * dphi / r;
                            virial += DMat3::from_cols(d * (scale * d.x), d * (scale * d.y), d * (scale * d.z));
                        }
                    }
                }
            }
        }

        if !energy.is_finite() {
            return Err(RelaxError::Evaluator(format!(
                "non-finite energy, atoms overlap (volume {:.3})",
                structure.volume()
            )));
        }

        Ok(Evaluation {
            energy,
            forces,
            stress: virial * (1.0 / structure.volume()),
        })
    }
}
