pub mod assemblage;
pub mod constraint;
pub mod ideal_solution;
pub mod minerals;
pub mod oracle;
pub mod phase;

pub use assemblage::Assemblage;
pub use constraint::{validate_constraints, CompositionRatio, EqualityConstraint, MacroConstraint};
pub use ideal_solution::{IdealSolutionOracle, SolverParams};
pub use oracle::{EquilibriumOracle, EquilibriumState, PhaseState, Solution};
pub use phase::{MacroState, Phase};
