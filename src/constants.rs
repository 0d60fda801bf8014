// Physical constants and default settings shared by the tracer and the relaxation driver.

pub const GAS_CONSTANT_J_PER_MOL_K: f64 = 8.31446261815324;

// 1 eV/Å³ expressed in GPa
pub const EV_PER_A3_TO_GPA: f64 = 160.21766208;
pub const GPA_TO_EV_PER_A3: f64 = 1.0 / EV_PER_A3_TO_GPA;

// default sweep settings:
pub const DEFAULT_SWEEP_STEPS: usize = 20;
pub const END_MEMBER_INSET: f64 = 0.001; // keeps sweeps off the pure end-members
pub const DEFAULT_LOW_ENDPOINT: f64 = END_MEMBER_INSET;
pub const DEFAULT_HIGH_ENDPOINT: f64 = 1.0 - END_MEMBER_INSET;

// assemblage bookkeeping
pub const FRACTION_SUM_TOLERANCE: f64 = 1e-9;
pub const MACROSCOPIC_VARIABLES: usize = 2; // pressure and temperature

// reference oracle root finding
pub const ROOT_TOLERANCE: f64 = 1e-12;
pub const ROOT_MAX_ITERATIONS: usize = 200;
pub const BRACKET_INITIAL_STEP: f64 = 25.0;
pub const BRACKET_MAX_EXPANSIONS: usize = 40;
pub const MIN_TEMPERATURE_K: f64 = 1.0;

// relaxation defaults (eV, Å)
pub const DEFAULT_FMAX_EV_PER_A: f64 = 0.01;
pub const DEFAULT_MAX_RELAX_STEPS: usize = 5000;
