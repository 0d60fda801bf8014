//! Error types for the boundary tracer and the relaxation driver.
//!
//! A step of a branch sweep that fails to converge is not an error: it is
//! dropped from the curve. Everything here aborts the operation that raised it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TracerError {
    /// The anchor solve did not converge; nothing downstream can be seeded.
    #[error("could not locate the anchor point from the supplied starting guesses: {reason}")]
    AnchorNotConverged { reason: String },

    #[error("constraint count {found} does not match the degrees of freedom ({expected} = 2 + free compositional vectors)")]
    ConstraintCount { expected: usize, found: usize },

    #[error("unknown phase '{0}'")]
    UnknownPhase(String),

    #[error("invalid composition: {0}")]
    InvalidComposition(String),

    #[error("invalid assemblage: {0}")]
    InvalidAssemblage(String),

    #[error("invalid sweep: {0}")]
    InvalidSweep(String),

    #[error("no free compositional vector available")]
    MissingFreeVector,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TracerResult<T> = std::result::Result<T, TracerError>;

#[derive(Error, Debug)]
pub enum RelaxError {
    #[error("relaxation did not converge after {iterations} steps (fmax = {fmax:.3e} eV/Å)")]
    NotConverged { iterations: usize, fmax: f64 },

    #[error("cell is singular or inverted (volume = {volume:.3e} Å³)")]
    SingularCell { volume: f64 },

    #[error("evaluator failed: {0}")]
    Evaluator(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type RelaxResult<T> = std::result::Result<T, RelaxError>;
