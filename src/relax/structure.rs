use crate::error::{RelaxError, RelaxResult};
use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cubic Bravais lattices the builder knows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrystalKind {
    Fcc,
    Bcc,
    SimpleCubic,
}

impl CrystalKind {
    pub fn atoms_per_cubic_cell(&self) -> usize {
        match self {
            CrystalKind::Fcc => 4,
            CrystalKind::Bcc => 2,
            CrystalKind::SimpleCubic => 1,
        }
    }

    /// Cubic lattice constant of a crystal with `volume_per_atom`.
    pub fn lattice_constant(&self, volume_per_atom: f64) -> f64 {
        (volume_per_atom * self.atoms_per_cubic_cell() as f64).cbrt()
    }

    /// Fractional basis of the conventional cubic cell.
    fn cubic_basis(&self) -> &'static [[f64; 3]] {
        match self {
            CrystalKind::Fcc => &[[0.0, 0.0, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]],
            CrystalKind::Bcc => &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
            CrystalKind::SimpleCubic => &[[0.0, 0.0, 0.0]],
        }
    }
}

impl fmt::Display for CrystalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrystalKind::Fcc => "fcc",
            CrystalKind::Bcc => "bcc",
            CrystalKind::SimpleCubic => "sc",
        };
        write!(f, "{}", name)
    }
}

/// A periodic crystal: lattice vectors as the columns of `cell` (Å) and
/// cartesian atom positions (Å).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub cell: DMat3,
    pub positions: Vec<DVec3>,
    pub symbols: Vec<String>,
}

impl Structure {
    pub fn new(cell: DMat3, positions: Vec<DVec3>, symbols: Vec<String>) -> RelaxResult<Self> {
        let structure = Self { cell, positions, symbols };
        structure.validate()?;
        Ok(structure)
    }

    pub fn validate(&self) -> RelaxResult<()> {
        if self.positions.is_empty() {
            return Err(RelaxError::Config("structure has no atoms".into()));
        }
        if self.positions.len() != self.symbols.len() {
            return Err(RelaxError::Config(format!(
                "{} positions but {} symbols",
                self.positions.len(),
                self.symbols.len()
            )));
        }
        let volume = self.volume();
        if !volume.is_finite() || volume <= 0.0 {
            return Err(RelaxError::SingularCell { volume });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Signed volume; positive for a right-handed cell.
    pub fn volume(&self) -> f64 {
        self.cell.determinant()
    }

    pub fn volume_per_atom(&self) -> f64 {
        self.volume() / self.len() as f64
    }

    /// Lattice vectors `a`, `b`, `c`.
    pub fn lattice_vectors(&self) -> [DVec3; 3] {
        [self.cell.x_axis, self.cell.y_axis, self.cell.z_axis]
    }

    /// Lattice vector lengths.
    pub fn lengths(&self) -> DVec3 {
        DVec3::new(self.cell.x_axis.length(), self.cell.y_axis.length(), self.cell.z_axis.length())
    }

    pub fn fractional_positions(&self) -> Vec<DVec3> {
        let inverse = self.cell.inverse();
        self.positions.iter().map(|r| inverse * *r).collect()
    }

    pub fn from_fractional(cell: DMat3, fractional: &[DVec3], symbols: Vec<String>) -> RelaxResult<Self> {
        Self::new(cell, fractional.iter().map(|f| cell * *f).collect(), symbols)
    }

    /// Primitive cell of a cubic crystal with conventional lattice constant `a`.
    pub fn bulk(symbol: &str, kind: CrystalKind, a: f64) -> RelaxResult<Self> {
        if !(a.is_finite() && a > 0.0) {
            return Err(RelaxError::Config(format!("lattice constant {} must be positive", a)));
        }
        let h = 0.5 * a;
        let cell = match kind {
            CrystalKind::Fcc => DMat3::from_cols(
                DVec3::new(0.0, h, h),
                DVec3::new(h, 0.0, h),
                DVec3::new(h, h, 0.0),
            ),
            CrystalKind::Bcc => DMat3::from_cols(
                DVec3::new(-h, h, h),
                DVec3::new(h, -h, h),
                DVec3::new(h, h, -h),
            ),
            CrystalKind::SimpleCubic => DMat3::from_diagonal(DVec3::splat(a)),
        };
        Self::new(cell, vec![DVec3::ZERO], vec![symbol.to_string()])
    }

    /// Conventional cubic cell holding `kind.atoms_per_cubic_cell()` atoms.
    pub fn bulk_cubic(symbol: &str, kind: CrystalKind, a: f64) -> RelaxResult<Self> {
        if !(a.is_finite() && a > 0.0) {
            return Err(RelaxError::Config(format!("lattice constant {} must be positive", a)));
        }
        let cell = DMat3::from_diagonal(DVec3::splat(a));
        let fractional: Vec<DVec3> = kind.cubic_basis().iter().map(|f| DVec3::from_array(*f)).collect();
        let symbols = vec![symbol.to_string(); fractional.len()];
        Self::from_fractional(cell, &fractional, symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_primitive_volumes() {
        let a = 4.0;
        for kind in [CrystalKind::Fcc, CrystalKind::Bcc, CrystalKind::SimpleCubic] {
            let primitive = Structure::bulk("Ar", kind, a).unwrap();
            let cubic = Structure::bulk_cubic("Ar", kind, a).unwrap();
            assert_abs_diff_eq!(primitive.volume_per_atom(), cubic.volume_per_atom(), epsilon = 1e-10);
            assert_abs_diff_eq!(kind.lattice_constant(primitive.volume_per_atom()), a, epsilon = 1e-10);
            assert_eq!(cubic.len(), kind.atoms_per_cubic_cell());
        }
    }

    #[test]
    fn test_fractional_round_trip() {
        let s = Structure::bulk_cubic("Ar", CrystalKind::Fcc, 5.0).unwrap();
        let fractional = s.fractional_positions();
        assert_abs_diff_eq!(fractional[3].x, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(fractional[3].z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Structure::bulk("Ar", CrystalKind::Fcc, -1.0).is_err());
        let flat = DMat3::from_cols(DVec3::X, DVec3::Y, DVec3::ZERO);
        assert!(matches!(
            Structure::new(flat, vec![DVec3::ZERO], vec!["Ar".into()]),
            Err(RelaxError::SingularCell { .. })
        ));
    }
}
