//! FIRE minimizer (fast inertial relaxation engine) over lists of 3-vectors.
//!
//! Integration is semi-implicit Euler followed by the FIRE velocity mixing.
//! The timestep and damping follow a small state machine: after
//! `speedup_latency` consecutive downhill steps the timestep grows and the
//! damping shrinks; an uphill step resets the velocity, halves the timestep
//! and restores the initial damping.

use crate::error::{RelaxError, RelaxResult};
use glam::DVec3;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct FireParams {
    /// Force damping coefficient (alpha in the FIRE paper).
    #[serde(default = "params_damping_init")]
    pub damping_init: f64,
    /// Value less than 1 used to decrease alpha.
    #[serde(default = "params_damping_reduction")]
    pub damping_reduction: f64,
    /// Prevent speedup for this many steps after a reset.
    #[serde(default = "params_speedup_latency")]
    pub speedup_latency: u64,
    /// Value greater than 1 used when the timestep is increased.
    #[serde(default = "params_speedup_factor")]
    pub speedup_factor: f64,
    /// Value less than 1 used when the timestep is reduced.
    #[serde(default = "params_slowdown_factor")]
    pub slowdown_factor: f64,
    #[serde(default = "params_timestep_max")]
    pub timestep_max: f64,
    /// Uniform mass for all coordinates.
    #[serde(default = "params_mass")]
    pub mass: f64,
    /// Largest displacement of any single coordinate per step (Å).
    #[serde(default = "params_max_step")]
    pub max_step: f64,
}

fn params_damping_init() -> f64 { 0.1 }
fn params_damping_reduction() -> f64 { 0.99 }
fn params_speedup_latency() -> u64 { 5 }
fn params_speedup_factor() -> f64 { 1.1 }
fn params_slowdown_factor() -> f64 { 0.5 }
fn params_timestep_max() -> f64 { 0.1 }
fn params_mass() -> f64 { 1. }
fn params_max_step() -> f64 { 0.2 }

impl Default for FireParams {
    fn default() -> Self {
        Self {
            damping_init: params_damping_init(),
            damping_reduction: params_damping_reduction(),
            speedup_latency: params_speedup_latency(),
            speedup_factor: params_speedup_factor(),
            slowdown_factor: params_slowdown_factor(),
            timestep_max: params_timestep_max(),
            mass: params_mass(),
            max_step: params_max_step(),
        }
    }
}

impl FireParams {
    pub fn validate(&self) -> RelaxResult<()> {
        let positive = [self.timestep_max, self.mass, self.max_step, self.speedup_factor];
        if positive.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(RelaxError::Config(format!("FIRE parameters must be positive: {:?}", self)));
        }
        if !(0.0..1.0).contains(&self.damping_init)
            || !(0.0..=1.0).contains(&self.damping_reduction)
            || !(0.0..1.0).contains(&self.slowdown_factor)
        {
            return Err(RelaxError::Config(format!("FIRE factors out of range: {:?}", self)));
        }
        Ok(())
    }
}

/// Timestep/damping state between iterations.
#[derive(Debug, Clone)]
struct FireFsm {
    params: FireParams,
    damping_coeff: f64,
    timestep: f64,
    num_good_steps: u64,
}

impl FireFsm {
    fn new(params: &FireParams) -> Self {
        FireFsm {
            params: params.clone(),
            damping_coeff: params.damping_init,
            timestep: params.timestep_max * 0.1,
            num_good_steps: 0,
        }
    }

    fn should_reset_velocity(&self) -> bool {
        self.num_good_steps == 0
    }

    /// `power` is `F·v`; positive means the last step went downhill.
    fn check_power(mut self, power: f64) -> FireFsm {
        if power > 0.0 {
            self.num_good_steps += 1;
            if self.num_good_steps >= self.params.speedup_latency {
                self.timestep *= self.params.speedup_factor;
                self.damping_coeff *= self.params.damping_reduction;
            }
        } else {
            self.num_good_steps = 0;
            self.timestep *= self.params.slowdown_factor;
            self.damping_coeff = self.params.damping_init;
        }
        self.timestep = f64::min(self.timestep, self.params.timestep_max);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FireOutput {
    pub iterations: usize,
    pub position: Vec<DVec3>,
    pub forces: Vec<DVec3>,
    pub value: f64,
    pub timestep: f64,
}

fn fmax(forces: &[DVec3]) -> f64 {
    forces.iter().map(|f| f.length()).fold(0.0, f64::max)
}

fn dot(a: &[DVec3], b: &[DVec3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x.dot(*y)).sum()
}

fn norm(a: &[DVec3]) -> f64 {
    dot(a, a).sqrt()
}

/// Minimize until every force is below `fmax_target`.
///
/// `compute` returns the value and the forces (negative gradient) at a
/// position. Runs out of budget with `RelaxError::NotConverged`.
pub fn minimize<F>(
    params: &FireParams,
    initial_position: Vec<DVec3>,
    fmax_target: f64,
    max_iterations: usize,
    mut compute: F,
) -> RelaxResult<FireOutput>
where
    F: FnMut(&[DVec3]) -> RelaxResult<(f64, Vec<DVec3>)>,
{
    params.validate()?;
    let mut position = initial_position;
    let (mut value, mut forces) = compute(&position)?;
    let mut velocity = vec![DVec3::ZERO; position.len()];
    let mut fsm = FireFsm::new(params);

    for iterations in 0..=max_iterations {
        let current_fmax = fmax(&forces);
        trace!(
            "FIRE {:5}  value {:.10}  fmax {:.3e}  dt {:.4}",
            iterations, value, current_fmax, fsm.timestep
        );
        if current_fmax < fmax_target {
            info!("FIRE finished after {} iterations", iterations);
            debug!("     value: {}", value);
            debug!("      fmax: {:e}", current_fmax);
            return Ok(FireOutput { iterations, position, forces, value, timestep: fsm.timestep });
        }
        if iterations == max_iterations {
            break;
        }

        if fsm.should_reset_velocity() {
            velocity.iter_mut().for_each(|v| *v = DVec3::ZERO);
        }
        let (timestep, damping) = (fsm.timestep, fsm.damping_coeff);

        let md_velocity: Vec<DVec3> = velocity
            .iter()
            .zip(&forces)
            .map(|(v, f)| *v + (timestep / params.mass) * *f)
            .collect();
        let md_norm = norm(&md_velocity);
        let force_norm = norm(&forces);
        let mixing = if force_norm > 0.0 { damping * md_norm / force_norm } else { 0.0 };
        velocity = md_velocity
            .iter()
            .zip(&forces)
            .map(|(v, f)| (1.0 - damping) * *v + mixing * *f)
            .collect();

        let mut displacement: Vec<DVec3> = velocity.iter().map(|v| timestep * *v).collect();
        let longest = fmax(&displacement);
        if longest > params.max_step {
            let scale = params.max_step / longest;
            displacement.iter_mut().for_each(|d| *d *= scale);
        }
        position.iter_mut().zip(&displacement).for_each(|(x, d)| *x += *d);

        let (next_value, next_forces) = compute(&position)?;
        value = next_value;
        forces = next_forces;
        fsm = fsm.check_power(dot(&forces, &velocity));
    }

    Err(RelaxError::NotConverged { iterations: max_iterations, fmax: fmax(&forces) })
}
