// Phase boundary tracing and export
pub mod csv_writer;
pub mod curve;
pub mod tracer;

pub use csv_writer::BoundaryCsvWriter;
pub use curve::{Anchor, BoundaryCurve, BoundaryPoint, BranchSpec, PhaseBoundary, TieLine};
pub use tracer::{BoundaryTracer, TracerParams};
