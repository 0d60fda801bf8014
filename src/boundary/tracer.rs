//! Anchor search and branch sweeps along a phase boundary.
//!
//! A boundary is traced from its anchor, the univariant point where the
//! assemblage coexists with every other phase at zero abundance. Each branch
//! then pins the driving phase composition at evenly spaced values and lets
//! the oracle find the free macroscopic variable at which the partner phase
//! just appears. Every step is seeded from the anchor, never from the
//! previous step, so steps are independent and failures do not propagate.

use crate::boundary::curve::{Anchor, BoundaryCurve, BoundaryPoint, BranchSpec, PhaseBoundary};
use crate::composition::{Composition, ExchangeVector};
use crate::constants::{DEFAULT_HIGH_ENDPOINT, DEFAULT_LOW_ENDPOINT, DEFAULT_SWEEP_STEPS, END_MEMBER_INSET};
use crate::equilibrium::assemblage::Assemblage;
use crate::equilibrium::constraint::{
    validate_constraints, CompositionRatio, EqualityConstraint, MacroConstraint,
};
use crate::equilibrium::oracle::{EquilibriumOracle, Solution};
use crate::equilibrium::phase::{MacroState, Phase};
use crate::error::{TracerError, TracerResult};
use crate::math_utils::Linspace;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerParams {
    /// Sweep steps per branch, both ends included.
    pub steps: usize,
    pub low_endpoint: f64,
    pub high_endpoint: f64,
    /// Solve the steps of a branch on the rayon pool.
    pub parallel: bool,
}

impl Default for TracerParams {
    fn default() -> Self {
        Self {
            steps: DEFAULT_SWEEP_STEPS,
            low_endpoint: DEFAULT_LOW_ENDPOINT,
            high_endpoint: DEFAULT_HIGH_ENDPOINT,
            parallel: false,
        }
    }
}

pub struct BoundaryTracer<O> {
    oracle: O,
    free_vectors: Vec<ExchangeVector>,
    params: TracerParams,
}

/// The per-step inputs shared by every step of one branch.
struct BranchSeed<'a> {
    bulk: &'a Composition,
    driving: Phase,
    partner: Phase,
    fixed: MacroConstraint,
    hint: MacroState,
}

impl<O: EquilibriumOracle + Sync> BoundaryTracer<O> {
    pub fn new(oracle: O, free_vectors: Vec<ExchangeVector>) -> Self {
        Self { oracle, free_vectors, params: TracerParams::default() }
    }

    pub fn with_params(mut self, params: TracerParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &TracerParams {
        &self.params
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn free_vectors(&self) -> &[ExchangeVector] {
        &self.free_vectors
    }

    /// Every oracle call goes through here so malformed constraint sets never reach it.
    fn solve_checked(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        constraints: &[EqualityConstraint],
        free_vectors: &[ExchangeVector],
    ) -> TracerResult<Solution> {
        validate_constraints(assemblage, constraints, free_vectors)?;
        Ok(self.oracle.solve(bulk, assemblage, constraints, free_vectors))
    }

    /// Solve for the point where every phase after the first sits at zero abundance.
    ///
    /// Two or three phases are accepted. A three-phase anchor is an invariant
    /// point and consumes one free compositional vector; a two-phase anchor
    /// takes its composition from `bulk` and consumes none.
    pub fn locate_anchor(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        fixed: MacroConstraint,
    ) -> TracerResult<Anchor> {
        assemblage.validate()?;
        if !(2..=3).contains(&assemblage.len()) {
            return Err(TracerError::InvalidAssemblage(format!(
                "an anchor needs two or three phases, found {}",
                assemblage.len()
            )));
        }
        let used = assemblage.len() - 2;
        if self.free_vectors.len() < used {
            return Err(TracerError::MissingFreeVector);
        }
        let free_vectors = &self.free_vectors[..used];

        let mut constraints = vec![fixed.to_equality()];
        constraints.extend(
            assemblage.phases[1..]
                .iter()
                .map(|p| EqualityConstraint::phase_fraction(&p.name, 0.0)),
        );

        let seeded = Assemblage::new(
            assemblage.phases.clone(),
            assemblage.fractions.clone(),
            fixed.apply_to(assemblage.hint),
        )?;

        match self.solve_checked(bulk, &seeded, &constraints, free_vectors)? {
            Solution::Converged(state) => {
                info!(
                    "anchor of {} at {}: {} = {:.4}",
                    assemblage.names().join("+"),
                    fixed,
                    fixed.free_variable_name(),
                    fixed.free_value(&state.macro_state())
                );
                for phase in &state.phases {
                    debug!("  {} x = {:.6}", phase.name, phase.minor_fraction());
                }
                Ok(Anchor { fixed, state })
            }
            Solution::NotConverged { reason, .. } => Err(TracerError::AnchorNotConverged { reason }),
        }
    }

    /// Sweep the composition of `m1` from its anchor value to `far_endpoint`
    /// while `m2` is held at zero abundance.
    ///
    /// Steps that fail to converge are dropped, so the curve can be shorter
    /// than `steps`.
    #[allow(clippy::too_many_arguments)]
    pub fn trace_branch(
        &self,
        bulk: &Composition,
        m1: &Phase,
        m2: &Phase,
        fixed: MacroConstraint,
        anchor: &Anchor,
        far_endpoint: f64,
        steps: usize,
    ) -> TracerResult<BoundaryCurve> {
        match self.free_vectors.len() {
            0 => return Err(TracerError::MissingFreeVector),
            1 => {}
            n => {
                // fixed variable, driving composition and partner abundance
                return Err(TracerError::ConstraintCount { expected: 2 + n, found: 3 });
            }
        }
        if steps == 0 {
            return Err(TracerError::InvalidSweep("a branch needs at least one step".into()));
        }
        if !(END_MEMBER_INSET..=1.0 - END_MEMBER_INSET).contains(&far_endpoint) {
            return Err(TracerError::InvalidSweep(format!(
                "far endpoint {} must lie in [{}, {}]",
                far_endpoint,
                END_MEMBER_INSET,
                1.0 - END_MEMBER_INSET
            )));
        }
        if m1.name == m2.name {
            return Err(TracerError::InvalidSweep(format!("{} cannot partner itself", m1.name)));
        }

        let start = anchor.minor_fraction(&m1.name)?;
        if (start - far_endpoint).abs() <= f64::EPSILON {
            return Err(TracerError::InvalidSweep(format!(
                "sweep of {} starts and ends at {}",
                m1.name, start
            )));
        }

        let seed_fraction = anchor.minor_fraction(&m2.name)?;
        let seed = BranchSeed {
            bulk,
            driving: m1.with_minor_fraction(seed_fraction)?,
            partner: m2.with_minor_fraction(seed_fraction)?,
            fixed,
            hint: anchor.state.macro_state(),
        };

        let sweep = Linspace::new(start, far_endpoint, steps);
        let outcomes: Vec<Option<BoundaryPoint>> = if self.params.parallel {
            let values: Vec<f64> = sweep.collect();
            values.par_iter().map(|&x| self.sweep_step(&seed, x)).collect::<TracerResult<_>>()?
        } else {
            sweep.map(|x| self.sweep_step(&seed, x)).collect::<TracerResult<_>>()?
        };

        let mut curve = BoundaryCurve::new(&m1.name, &m2.name, fixed);
        curve.attempted = steps;
        curve.points = outcomes.into_iter().flatten().collect();

        info!(
            "branch {}: {}/{} steps converged, {} {:.4} -> {:.4}",
            curve.label(),
            curve.len(),
            steps,
            m1.name,
            start,
            far_endpoint
        );
        Ok(curve)
    }

    /// One solve of a branch. `Ok(None)` is a step that did not converge.
    fn sweep_step(&self, seed: &BranchSeed<'_>, x: f64) -> TracerResult<Option<BoundaryPoint>> {
        let driving = &seed.driving;
        let partner = &seed.partner;
        let assemblage = Assemblage::new(
            vec![driving.clone(), partner.clone()],
            vec![1.0, 0.0],
            seed.hint,
        )?;
        let ratio = CompositionRatio::end_member_fraction(&driving.species[0], &driving.species[1], x);
        let constraints = [
            seed.fixed.to_equality(),
            EqualityConstraint::phase_composition(&driving.name, ratio),
            EqualityConstraint::phase_fraction(&partner.name, 0.0),
        ];

        let state = match self.solve_checked(seed.bulk, &assemblage, &constraints, &self.free_vectors)? {
            Solution::Converged(state) => state,
            Solution::NotConverged { iterations, reason } => {
                debug!(
                    "{}-{} step x = {:.6} dropped after {} iterations: {}",
                    driving.name, partner.name, x, iterations, reason
                );
                return Ok(None);
            }
        };

        match (state.phase(&driving.name), state.phase(&partner.name)) {
            (Some(d), Some(p)) => Ok(Some(BoundaryPoint {
                sweep_value: x,
                pressure: state.pressure,
                temperature: state.temperature,
                driving_fraction: d.minor_fraction(),
                partner_fraction: p.minor_fraction(),
            })),
            _ => {
                warn!(
                    "{}-{} step x = {:.6} converged without both phases, dropped",
                    driving.name, partner.name, x
                );
                Ok(None)
            }
        }
    }

    /// Default branch plan for an anchor assemblage.
    ///
    /// Three phases give `(0, 1)` and `(0, 2)`; two give `(0, 1)` and `(1, 0)`.
    /// Each branch runs toward the side of the composition axis its partner
    /// occupies at the anchor.
    pub fn branch_plan(&self, assemblage: &Assemblage, anchor: &Anchor) -> TracerResult<Vec<BranchSpec>> {
        let pairs: &[(usize, usize)] = match assemblage.len() {
            3 => &[(0, 1), (0, 2)],
            2 => &[(0, 1), (1, 0)],
            n => {
                return Err(TracerError::InvalidAssemblage(format!(
                    "no branch plan for {} phases",
                    n
                )));
            }
        };
        pairs
            .iter()
            .map(|&(driving, partner)| {
                let x_driving = anchor.minor_fraction(&assemblage.phases[driving].name)?;
                let x_partner = anchor.minor_fraction(&assemblage.phases[partner].name)?;
                let far_endpoint = if x_partner < x_driving {
                    self.params.low_endpoint
                } else {
                    self.params.high_endpoint
                };
                Ok(BranchSpec { driving, partner, far_endpoint })
            })
            .collect()
    }

    /// Locate the anchor and trace the default branches from it.
    pub fn trace_boundary(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        fixed: MacroConstraint,
    ) -> TracerResult<PhaseBoundary> {
        let anchor = self.locate_anchor(bulk, assemblage, fixed)?;
        let plan = self.branch_plan(assemblage, &anchor)?;
        self.trace_from_anchor(bulk, assemblage, fixed, anchor, &plan)
    }

    /// Locate the anchor and trace an explicit list of branches.
    pub fn trace_boundary_with(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        fixed: MacroConstraint,
        branches: &[BranchSpec],
    ) -> TracerResult<PhaseBoundary> {
        let anchor = self.locate_anchor(bulk, assemblage, fixed)?;
        self.trace_from_anchor(bulk, assemblage, fixed, anchor, branches)
    }

    fn trace_from_anchor(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        fixed: MacroConstraint,
        anchor: Anchor,
        branches: &[BranchSpec],
    ) -> TracerResult<PhaseBoundary> {
        let mut curves = Vec::with_capacity(branches.len());
        for spec in branches {
            let (m1, m2) = match (assemblage.phases.get(spec.driving), assemblage.phases.get(spec.partner)) {
                (Some(m1), Some(m2)) => (m1, m2),
                _ => {
                    return Err(TracerError::InvalidSweep(format!(
                        "branch ({}, {}) is outside an assemblage of {} phases",
                        spec.driving,
                        spec.partner,
                        assemblage.len()
                    )));
                }
            };
            curves.push(self.trace_branch(
                bulk,
                m1,
                m2,
                fixed,
                &anchor,
                spec.far_endpoint,
                self.params.steps,
            )?);
        }
        Ok(PhaseBoundary { anchor, curves })
    }
}
