//! Reference equilibrium oracle for binary ideal solid solutions.
//!
//! Every end-member has `G = H - T S + P V` and mixes ideally on one site, so
//! `mu = G + R T ln x`. Equating chemical potentials between a host phase `p`
//! and an incipient phase `q` gives, per end-member `i`,
//! `x_q,i = x_p,i * K_i` with `K_i = exp(-(G_q,i - G_p,i) / (R T))`.
//! The incipient phase appears when its fractions sum to one, which leaves a
//! single equation in the free macroscopic variable. That equation is solved
//! by bracket expansion from the hint followed by Illinois false position.

use crate::composition::{Composition, ExchangeVector};
use crate::constants::{
    BRACKET_INITIAL_STEP, BRACKET_MAX_EXPANSIONS, GAS_CONSTANT_J_PER_MOL_K, MIN_TEMPERATURE_K,
    ROOT_MAX_ITERATIONS, ROOT_TOLERANCE,
};
use crate::equilibrium::assemblage::Assemblage;
use crate::equilibrium::constraint::{EqualityConstraint, MacroConstraint};
use crate::equilibrium::minerals::{default_models, SolutionModel};
use crate::equilibrium::oracle::{EquilibriumOracle, EquilibriumState, PhaseState, Solution};
use crate::equilibrium::phase::MacroState;
use crate::error::TracerResult;
use crate::math_utils::{bracket_root, solve_bracketed};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root-finding settings for the free macroscopic variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub bracket_step: f64,
    pub max_expansions: usize,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            tolerance: ROOT_TOLERANCE,
            max_iterations: ROOT_MAX_ITERATIONS,
            bracket_step: BRACKET_INITIAL_STEP,
            max_expansions: BRACKET_MAX_EXPANSIONS,
        }
    }
}

/// How the host phase composition is pinned in a two-phase solve.
#[derive(Clone, Copy, Debug)]
enum Pinned {
    /// Host composition fixed directly.
    Host(f64),
    /// Incipient phase composition fixed; the host follows.
    Incipient(f64),
}

/// Constraint layouts this oracle knows how to solve.
#[derive(Clone, Copy, Debug)]
enum Layout {
    TwoPhase { host: usize, incipient: usize, pinned: Pinned },
    Invariant { host: usize, incipient: [usize; 2] },
}

struct Unsolved {
    iterations: usize,
    reason: String,
}

impl Unsolved {
    fn new(reason: impl Into<String>) -> Self {
        Self { iterations: 0, reason: reason.into() }
    }
}

#[derive(Clone, Debug)]
pub struct IdealSolutionOracle {
    models: HashMap<String, SolutionModel>,
    params: SolverParams,
}

impl IdealSolutionOracle {
    pub fn new(models: Vec<SolutionModel>) -> TracerResult<Self> {
        for model in &models {
            model.validate()?;
        }
        Ok(Self {
            models: models.into_iter().map(|m| (m.name.clone(), m)).collect(),
            params: SolverParams::default(),
        })
    }

    /// Oracle over the embedded model dataset.
    pub fn with_default_models() -> TracerResult<Self> {
        Self::new(default_models()?.values().cloned().collect())
    }

    pub fn with_params(mut self, params: SolverParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn model(&self, name: &str) -> Option<&SolutionModel> {
        self.models.get(name)
    }

    /// Partition coefficients `K_i` of `other` relative to `host` at `state`.
    fn partition(host: &SolutionModel, other: &SolutionModel, state: &MacroState) -> [f64; 2] {
        let rt = GAS_CONSTANT_J_PER_MOL_K * state.temperature;
        [0, 1].map(|i| (-(other.gibbs(i, state) - host.gibbs(i, state)) / rt).exp())
    }

    fn layout(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        constraints: &[EqualityConstraint],
        free_vectors: &[ExchangeVector],
        species: (&str, &str),
    ) -> Result<Layout, Unsolved> {
        let mut incipient = Vec::new();
        let mut compositions = Vec::new();
        for constraint in constraints {
            match constraint {
                EqualityConstraint::Pressure(_) | EqualityConstraint::Temperature(_) => {}
                EqualityConstraint::PhaseFraction { phase, value } => {
                    if value.abs() > f64::EPSILON {
                        return Err(Unsolved::new(format!(
                            "only vanishing phase fractions are supported, {} = {}",
                            phase, value
                        )));
                    }
                    let index = assemblage
                        .index_of(phase)
                        .map_err(|e| Unsolved::new(e.to_string()))?;
                    incipient.push(index);
                }
                EqualityConstraint::PhaseComposition { phase, ratio } => {
                    let index = assemblage
                        .index_of(phase)
                        .map_err(|e| Unsolved::new(e.to_string()))?;
                    let x = ratio
                        .solve_binary(&assemblage.phases[index])
                        .ok_or_else(|| Unsolved::new(format!("composition of {} cannot be pinned", phase)))?;
                    compositions.push((index, x));
                }
            }
        }

        let hosts: Vec<usize> = (0..assemblage.len()).filter(|i| !incipient.contains(i)).collect();
        if hosts.len() != 1 {
            return Err(Unsolved::new(format!(
                "expected exactly one stable phase, found {}",
                hosts.len()
            )));
        }
        let host = hosts[0];

        match (assemblage.len(), compositions.as_slice(), free_vectors.len()) {
            (2, [(index, x)], 1) => {
                let pinned = if *index == host { Pinned::Host(*x) } else { Pinned::Incipient(*x) };
                Ok(Layout::TwoPhase { host, incipient: incipient[0], pinned })
            }
            (2, [], 0) => {
                let x = bulk
                    .pair_fraction(species.0, species.1)
                    .map_err(|e| Unsolved::new(e.to_string()))?;
                Ok(Layout::TwoPhase { host, incipient: incipient[0], pinned: Pinned::Host(x) })
            }
            (3, [], 1) => Ok(Layout::Invariant { host, incipient: [incipient[0], incipient[1]] }),
            (n, c, f) => Err(Unsolved::new(format!(
                "unsupported layout: {} phases, {} composition constraints, {} free vectors",
                n,
                c.len(),
                f
            ))),
        }
    }

    fn find_free_value<F: FnMut(f64) -> f64>(
        &self,
        mut residual: F,
        fixed: &MacroConstraint,
        hint: &MacroState,
    ) -> Result<(f64, usize), Unsolved> {
        let lower_bound = match fixed {
            MacroConstraint::Pressure(_) => Some(MIN_TEMPERATURE_K),
            MacroConstraint::Temperature(_) => None,
        };
        let start = fixed.free_value(hint);
        let bracket = bracket_root(
            &mut residual,
            start,
            self.params.bracket_step,
            lower_bound,
            self.params.max_expansions,
        )
        .ok_or_else(|| {
            Unsolved::new(format!(
                "no sign change in the equilibrium residual around {} = {}",
                fixed.free_variable_name(),
                start
            ))
        })?;
        trace!("bracket [{}, {}] for {}", bracket.lo, bracket.hi, fixed.free_variable_name());

        solve_bracketed(&mut residual, bracket, self.params.tolerance, self.params.max_iterations)
            .ok_or_else(|| Unsolved {
                iterations: self.params.max_iterations,
                reason: format!("{} did not converge", fixed.free_variable_name()),
            })
    }

    fn try_solve(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        constraints: &[EqualityConstraint],
        free_vectors: &[ExchangeVector],
    ) -> Result<EquilibriumState, Unsolved> {
        if free_vectors.len() > 1 {
            return Err(Unsolved::new("at most one free compositional vector is supported"));
        }

        let mut fixed = None;
        for constraint in constraints {
            let macro_constraint = match constraint {
                EqualityConstraint::Pressure(p) => MacroConstraint::Pressure(*p),
                EqualityConstraint::Temperature(t) => MacroConstraint::Temperature(*t),
                _ => continue,
            };
            if fixed.replace(macro_constraint).is_some() {
                return Err(Unsolved::new("both pressure and temperature are fixed"));
            }
        }
        let fixed = fixed.ok_or_else(|| Unsolved::new("neither pressure nor temperature is fixed"))?;
        if let MacroConstraint::Temperature(t) = fixed {
            if t <= 0.0 {
                return Err(Unsolved::new(format!("temperature {} must be positive", t)));
            }
        }

        let models = assemblage
            .phases
            .iter()
            .map(|phase| {
                let model = self
                    .models
                    .get(&phase.name)
                    .ok_or_else(|| Unsolved::new(format!("no solution model for {}", phase.name)))?;
                if !model.matches(phase) {
                    return Err(Unsolved::new(format!(
                        "{} species {:?} do not match its model",
                        phase.name, phase.species
                    )));
                }
                Ok(model)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let species = models[0].species();
        let (major, minor) = (species[0], species[1]);
        if models.iter().any(|m| m.species() != species) {
            return Err(Unsolved::new("phases do not share one pair of site species"));
        }

        let layout = self.layout(bulk, assemblage, constraints, free_vectors, (major, minor))?;
        let hint = fixed.apply_to(assemblage.hint);

        let (free_value, iterations, minor_fractions) = match layout {
            Layout::TwoPhase { host, incipient, pinned } => {
                let (p, q) = (models[host], models[incipient]);
                let residual = |v: f64| {
                    let k = Self::partition(p, q, &fixed.state_at(v));
                    match pinned {
                        Pinned::Host(x) => (1.0 - x) * k[0] + x * k[1] - 1.0,
                        Pinned::Incipient(x) => (1.0 - x) / k[0] + x / k[1] - 1.0,
                    }
                };
                let (v, iterations) = self.find_free_value(residual, &fixed, &hint)?;
                let k = Self::partition(p, q, &fixed.state_at(v));
                let (x_p, x_q) = match pinned {
                    Pinned::Host(x) => (x, x * k[1]),
                    Pinned::Incipient(x) => (x / k[1], x),
                };
                let mut fractions = vec![0.0; assemblage.len()];
                fractions[host] = x_p;
                fractions[incipient] = x_q;
                (v, iterations, fractions)
            }
            Layout::Invariant { host, incipient: [q, r] } => {
                let p = models[host];
                let host_fraction = |other: &SolutionModel, state: &MacroState| {
                    let k = Self::partition(p, other, state);
                    (1.0 - k[0]) / (k[1] - k[0])
                };
                let residual = |v: f64| {
                    let state = fixed.state_at(v);
                    host_fraction(models[q], &state) - host_fraction(models[r], &state)
                };
                let (v, iterations) = self.find_free_value(residual, &fixed, &hint)?;
                let state = fixed.state_at(v);
                let x_p = host_fraction(models[q], &state);
                let mut fractions = vec![0.0; assemblage.len()];
                fractions[host] = x_p;
                fractions[q] = x_p * Self::partition(p, models[q], &state)[1];
                fractions[r] = x_p * Self::partition(p, models[r], &state)[1];
                (v, iterations, fractions)
            }
        };

        if let Some(x) = minor_fractions.iter().copied().find(|x| !(x.is_finite() && *x > 0.0 && *x < 1.0)) {
            return Err(Unsolved {
                iterations,
                reason: format!("converged composition {} lies outside (0, 1)", x),
            });
        }

        let host = match layout {
            Layout::TwoPhase { host, .. } | Layout::Invariant { host, .. } => host,
        };
        let bulk = match free_vectors.first() {
            Some(vector) => bulk
                .shifted_to_pair_fraction(vector, major, minor, minor_fractions[host])
                .ok_or_else(|| Unsolved::new(format!("free vector cannot change {}/({}+{})", minor, major, minor)))?
                .map_err(|e| Unsolved { iterations, reason: e.to_string() })?,
            None => bulk.clone(),
        };

        let state = fixed.state_at(free_value);
        let phases = assemblage
            .phases
            .iter()
            .zip(&minor_fractions)
            .enumerate()
            .map(|(i, (phase, x))| PhaseState {
                name: phase.name.clone(),
                fraction: if i == host { 1.0 } else { 0.0 },
                molar_fractions: vec![1.0 - x, *x],
            })
            .collect();

        Ok(EquilibriumState {
            pressure: state.pressure,
            temperature: state.temperature,
            phases,
            bulk,
            iterations,
        })
    }
}

impl EquilibriumOracle for IdealSolutionOracle {
    fn solve(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        constraints: &[EqualityConstraint],
        free_vectors: &[ExchangeVector],
    ) -> Solution {
        match self.try_solve(bulk, assemblage, constraints, free_vectors) {
            Ok(state) => Solution::Converged(state),
            Err(Unsolved { iterations, reason }) => Solution::NotConverged { iterations, reason },
        }
    }
}
