//! JSON job files for the two drivers.

use crate::boundary::{BoundaryTracer, BranchSpec, TracerParams};
use crate::composition::{Composition, ExchangeVector};
use crate::equilibrium::ideal_solution::{IdealSolutionOracle, SolverParams};
use crate::equilibrium::minerals::load_models;
use crate::equilibrium::{Assemblage, MacroConstraint, MacroState, Phase};
use crate::error::{RelaxError, RelaxResult, TracerError, TracerResult};
use crate::json_parser::JsonParser;
use crate::relax::{CrystalKind, LennardJones, RelaxParams, Structure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One phase of the starting assemblage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseEntry {
    pub name: String,
    /// `[major, minor]` site species
    pub species: [String; 2],
    /// Starting guess for the phase fraction
    pub fraction: f64,
    /// Starting guess for the minor end-member fraction
    #[serde(default = "default_minor_fraction")]
    pub minor_fraction: f64,
}

fn default_minor_fraction() -> f64 {
    0.5
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseDiagramJob {
    pub bulk: Composition,
    pub phases: Vec<PhaseEntry>,
    /// e.g. `{ "pressure": 200.0 }`
    pub fixed: MacroConstraint,
    /// Pressure/temperature starting guess for the anchor solve
    pub hint: MacroState,
    pub free_vectors: Vec<ExchangeVector>,
    #[serde(default)]
    pub tracer: TracerParams,
    #[serde(default)]
    pub solver: SolverParams,
    /// Model dataset; the embedded one when absent
    #[serde(default)]
    pub models: Option<PathBuf>,
    /// Explicit branch plan; the default plan when absent
    #[serde(default)]
    pub branches: Option<Vec<BranchSpec>>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl PhaseDiagramJob {
    pub fn load<P: AsRef<Path>>(path: P) -> TracerResult<Self> {
        let job: Self = JsonParser::load_typed(path)?;
        job.assemblage()?;
        Ok(job)
    }

    pub fn assemblage(&self) -> TracerResult<Assemblage> {
        let phases = self
            .phases
            .iter()
            .map(|p| Phase::binary(&p.name, &p.species[0], &p.species[1], p.minor_fraction))
            .collect::<TracerResult<Vec<_>>>()?;
        let fractions = self.phases.iter().map(|p| p.fraction).collect();
        Assemblage::new(phases, fractions, self.hint)
    }

    pub fn oracle(&self) -> TracerResult<IdealSolutionOracle> {
        let oracle = match &self.models {
            Some(path) => IdealSolutionOracle::new(load_models(path)?)?,
            None => IdealSolutionOracle::with_default_models()?,
        };
        for phase in &self.phases {
            if oracle.model(&phase.name).is_none() {
                return Err(TracerError::UnknownPhase(phase.name.clone()));
            }
        }
        Ok(oracle.with_params(self.solver.clone()))
    }

    pub fn tracer(&self) -> TracerResult<BoundaryTracer<IdealSolutionOracle>> {
        Ok(BoundaryTracer::new(self.oracle()?, self.free_vectors.clone()).with_params(self.tracer.clone()))
    }
}

/// One structure to relax.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrystalEntry {
    pub symbol: String,
    pub crystal: CrystalKind,
    /// Conventional cubic lattice constant (Å)
    pub lattice_constant: f64,
    /// Use the conventional cubic cell instead of the primitive one
    #[serde(default)]
    pub cubic: bool,
}

impl CrystalEntry {
    pub fn structure(&self) -> RelaxResult<Structure> {
        if self.cubic {
            Structure::bulk_cubic(&self.symbol, self.crystal, self.lattice_constant)
        } else {
            Structure::bulk(&self.symbol, self.crystal, self.lattice_constant)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelaxationJob {
    pub crystals: Vec<CrystalEntry>,
    pub potential: LennardJones,
    /// Target pressure (GPa)
    pub pressure: f64,
    #[serde(default)]
    pub relax: RelaxParams,
}

impl RelaxationJob {
    pub fn load<P: AsRef<Path>>(path: P) -> RelaxResult<Self> {
        let job: Self = JsonParser::load_typed(path).map_err(|e| RelaxError::Config(e.to_string()))?;
        job.validate()?;
        Ok(job)
    }

    pub fn validate(&self) -> RelaxResult<()> {
        if self.crystals.is_empty() {
            return Err(RelaxError::Config("no crystals to relax".into()));
        }
        LennardJones::new(self.potential.epsilon, self.potential.sigma, self.potential.cutoff)?;
        self.relax.fire.validate()
    }
}
