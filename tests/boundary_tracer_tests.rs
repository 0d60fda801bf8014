// Boundary tracer tests against the ideal-solution reference oracle
// Covers anchor determinism, sweep shape, step filtering and the
// periclase/wuestite loop at 200 (model pressure units) and at 2000 K

use approx::assert_abs_diff_eq;
use mineral_phase_rust::boundary::{BoundaryTracer, BranchSpec, TracerParams};
use mineral_phase_rust::composition::{Composition, ExchangeVector};
use mineral_phase_rust::config::PhaseDiagramJob;
use mineral_phase_rust::constants::{DEFAULT_HIGH_ENDPOINT, DEFAULT_LOW_ENDPOINT};
use mineral_phase_rust::equilibrium::{
    validate_constraints, Assemblage, EqualityConstraint, EquilibriumOracle, IdealSolutionOracle,
    MacroConstraint, MacroState, Phase, Solution,
};
use mineral_phase_rust::error::TracerError;
use mineral_phase_rust::math_utils::Linspace;
use more_asserts::{assert_ge, assert_gt, assert_le, assert_lt};
use std::sync::atomic::{AtomicUsize, Ordering};

const P_FIXED: f64 = 200.0;
const T_FIXED: f64 = 2000.0;
const ANCHOR_T: f64 = 2378.6366106699716;
const ANCHOR_X_RICH: f64 = 0.7332688844132483;
const ANCHOR_X_POOR: f64 = 0.26673111558675205;

/// Wraps an oracle, counts calls, and fails every step whose pinned
/// composition falls inside `fail_between`.
struct FlakyOracle<O> {
    inner: O,
    fail_between: (f64, f64),
    calls: AtomicUsize,
}

impl<O> FlakyOracle<O> {
    fn new(inner: O, fail_between: (f64, f64)) -> Self {
        Self { inner, fail_between, calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<O: EquilibriumOracle> EquilibriumOracle for FlakyOracle<O> {
    fn solve(
        &self,
        bulk: &Composition,
        assemblage: &Assemblage,
        constraints: &[EqualityConstraint],
        free_vectors: &[ExchangeVector],
    ) -> Solution {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pinned = constraints.iter().find_map(|c| match c {
            EqualityConstraint::PhaseComposition { ratio, .. } => Some(ratio.value),
            _ => None,
        });
        if let Some(x) = pinned {
            if x > self.fail_between.0 && x < self.fail_between.1 {
                return Solution::failed(format!("synthetic failure at x = {}", x));
            }
        }
        self.inner.solve(bulk, assemblage, constraints, free_vectors)
    }
}

fn oracle() -> IdealSolutionOracle {
    IdealSolutionOracle::with_default_models().unwrap()
}

fn mg_fe() -> Vec<ExchangeVector> {
    vec![ExchangeVector::exchange("Mg", "Fe").unwrap()]
}

fn bulk() -> Composition {
    Composition::from_pairs(&[("Fe", 0.5), ("Mg", 0.5), ("O", 1.0)]).unwrap()
}

fn assemblage(names: &[&str]) -> Assemblage {
    let phases = names.iter().map(|n| Phase::binary(n, "Mg", "Fe", 0.5).unwrap()).collect();
    let mut fractions = vec![0.0; names.len()];
    fractions[0] = 1.0;
    Assemblage::new(phases, fractions, MacroState::new(P_FIXED, 2500.0)).unwrap()
}

#[test]
fn test_locate_anchor_is_deterministic() {
    println!("⚓ Testing anchor determinism");

    let tracer = BoundaryTracer::new(oracle(), mg_fe());
    let fixed = MacroConstraint::Pressure(P_FIXED);

    for names in [&["periclase", "wuestite"][..], &["alpha", "beta", "gamma"][..]] {
        let a = assemblage(names);
        let first = tracer.locate_anchor(&bulk(), &a, fixed).unwrap();
        let second = tracer.locate_anchor(&bulk(), &a, fixed).unwrap();
        println!("   {:?}: T = {:.4} K", names, first.temperature());

        assert_eq!(first, second);
        assert_abs_diff_eq!(first.temperature(), ANCHOR_T, epsilon = 1e-6);
        assert_eq!(first.pressure(), P_FIXED);
    }
}

#[test]
fn test_three_phase_anchor_compositions() {
    println!("🔺 Testing the alpha/beta/gamma invariant point");

    let tracer = BoundaryTracer::new(oracle(), mg_fe());
    let anchor = tracer
        .locate_anchor(&bulk(), &assemblage(&["alpha", "beta", "gamma"]), MacroConstraint::Pressure(P_FIXED))
        .unwrap();

    let x: Vec<f64> = ["alpha", "beta", "gamma"].iter().map(|n| anchor.minor_fraction(n).unwrap()).collect();
    println!("   x(alpha, beta, gamma) = {:?}", x);

    assert_abs_diff_eq!(x[0], 0.5, epsilon = 1e-8);
    assert_abs_diff_eq!(x[1], ANCHOR_X_POOR, epsilon = 1e-8);
    assert_abs_diff_eq!(x[2], ANCHOR_X_RICH, epsilon = 1e-8);
}

#[test]
fn test_anchor_failure_is_fatal() {
    println!("💥 Testing non-converging anchor");

    // no solution model is registered for olivine
    let tracer = BoundaryTracer::new(oracle(), mg_fe());
    let a = Assemblage::new(
        vec![
            Phase::binary("periclase", "Mg", "Fe", 0.5).unwrap(),
            Phase::binary("olivine", "Mg", "Fe", 0.5).unwrap(),
        ],
        vec![1.0, 0.0],
        MacroState::new(P_FIXED, 2500.0),
    )
    .unwrap();

    let result = tracer.trace_boundary(&bulk(), &a, MacroConstraint::Pressure(P_FIXED));
    match result {
        Err(TracerError::AnchorNotConverged { reason }) => {
            println!("   reason: {}", reason);
            assert!(reason.contains("olivine"));
        }
        other => panic!("expected AnchorNotConverged, got {:?}", other.map(|b| b.curves.len())),
    }
}

#[test]
fn test_sweep_is_monotone_and_complete() {
    println!("📈 Testing sweep ordering and length");

    let tracer = BoundaryTracer::new(oracle(), mg_fe());
    let a = assemblage(&["periclase", "wuestite"]);
    let fixed = MacroConstraint::Pressure(P_FIXED);
    let anchor = tracer.locate_anchor(&bulk(), &a, fixed).unwrap();

    let steps = 15;
    let curve = tracer
        .trace_branch(&bulk(), &a.phases[0], &a.phases[1], fixed, &anchor, DEFAULT_HIGH_ENDPOINT, steps)
        .unwrap();

    println!("   {} of {} steps converged", curve.len(), curve.attempted);
    assert_eq!(curve.len(), steps);
    assert_eq!(curve.attempted, steps);

    let values: Vec<f64> = curve.sweep_values().collect();
    for pair in values.windows(2) {
        assert_lt!(pair[0], pair[1]);
    }
    assert_eq!(*values.last().unwrap(), DEFAULT_HIGH_ENDPOINT);

    // the partner becomes stable at lower temperature as the host gets richer in Fe
    let temperatures: Vec<f64> = curve.free_values().collect();
    for pair in temperatures.windows(2) {
        assert_gt!(pair[0], pair[1]);
    }
}

#[test]
fn test_failed_steps_are_filtered() {
    println!("🧹 Testing the filtering law");

    let flaky = FlakyOracle::new(oracle(), (0.6, 0.8));
    let tracer = BoundaryTracer::new(&flaky, mg_fe());
    let a = assemblage(&["periclase", "wuestite"]);
    let fixed = MacroConstraint::Pressure(P_FIXED);
    let anchor = tracer.locate_anchor(&bulk(), &a, fixed).unwrap();

    let steps = 20;
    let start = anchor.minor_fraction("periclase").unwrap();
    let expected = Linspace::new(start, DEFAULT_HIGH_ENDPOINT, steps)
        .filter(|x| !(*x > 0.6 && *x < 0.8))
        .count();

    let calls_before = flaky.calls();
    let curve = tracer
        .trace_branch(&bulk(), &a.phases[0], &a.phases[1], fixed, &anchor, DEFAULT_HIGH_ENDPOINT, steps)
        .unwrap();

    println!("   kept {} of {} steps ({} expected)", curve.len(), steps, expected);
    assert_eq!(flaky.calls() - calls_before, steps);
    assert_eq!(curve.len(), expected);
    assert_eq!(curve.failed(), steps - expected);
    assert_lt!(curve.len(), steps);
    assert!(curve.points.iter().all(|p| !(p.sweep_value > 0.6 && p.sweep_value < 0.8)));
}

#[test]
fn test_first_point_reproduces_anchor() {
    println!("🔗 Testing anchor continuity");

    let tracer = BoundaryTracer::new(oracle(), mg_fe());
    let fixed = MacroConstraint::Pressure(P_FIXED);

    for names in [&["periclase", "wuestite"][..], &["alpha", "beta", "gamma"][..]] {
        let boundary = tracer.trace_boundary(&bulk(), &assemblage(names), fixed).unwrap();
        let anchor_value = boundary.anchor.free_value();
        for curve in &boundary.curves {
            let first = curve.points[0].free_value(&fixed);
            println!("   {}: first T = {:.6}, anchor T = {:.6}", curve.label(), first, anchor_value);
            assert_le!(((first - anchor_value) / anchor_value).abs(), 1e-6);
        }
    }
}

#[test]
fn test_endpoints_stay_inside_composition_range() {
    println!("🚧 Testing endpoint inset");

    let tracer = BoundaryTracer::new(oracle(), mg_fe());
    let boundary = tracer
        .trace_boundary(&bulk(), &assemblage(&["alpha", "beta", "gamma"]), MacroConstraint::Pressure(P_FIXED))
        .unwrap();

    for curve in &boundary.curves {
        for point in &curve.points {
            assert_ge!(point.sweep_value, DEFAULT_LOW_ENDPOINT);
            assert_le!(point.sweep_value, DEFAULT_HIGH_ENDPOINT);
            assert_gt!(point.partner_fraction, 0.0);
            assert_lt!(point.partner_fraction, 1.0);
        }
    }

    let a = assemblage(&["periclase", "wuestite"]);
    let fixed = MacroConstraint::Pressure(P_FIXED);
    let anchor = tracer.locate_anchor(&bulk(), &a, fixed).unwrap();
    for endpoint in [0.0, 1.0] {
        let result = tracer.trace_branch(&bulk(), &a.phases[0], &a.phases[1], fixed, &anchor, endpoint, 10);
        assert!(matches!(result, Err(TracerError::InvalidSweep(_))));
    }
}

#[test]
fn test_periclase_wuestite_end_to_end() {
    println!("🌋 Tracing periclase/wuestite at P = {}", P_FIXED);

    let tracer = BoundaryTracer::new(oracle(), mg_fe());
    let fixed = MacroConstraint::Pressure(P_FIXED);
    let boundary = tracer
        .trace_boundary(&bulk(), &assemblage(&["periclase", "wuestite"]), fixed)
        .unwrap();

    let tie = boundary.tie_line();
    println!("   anchor T = {:.2} K, tie line {:.4} .. {:.4}", tie.free_value, tie.low, tie.high);
    assert_abs_diff_eq!(tie.free_value, ANCHOR_T, epsilon = 1e-6);
    assert_abs_diff_eq!(tie.low, 0.5, epsilon = 1e-10);
    assert_abs_diff_eq!(tie.high, ANCHOR_X_RICH, epsilon = 1e-8);

    assert_eq!(boundary.curves.len(), 2);
    let per = boundary.curve("periclase", "wuestite").unwrap();
    let wus = boundary.curve("wuestite", "periclase").unwrap();
    assert_eq!(per.len(), 20);
    assert_eq!(wus.len(), 20);
    assert_eq!(per.sweep_values().last().unwrap(), DEFAULT_HIGH_ENDPOINT);
    assert_eq!(wus.sweep_values().last().unwrap(), DEFAULT_LOW_ENDPOINT);

    // the loop closes between the end-member transition temperatures
    for curve in &boundary.curves {
        for point in &curve.points {
            assert_eq!(point.pressure, P_FIXED);
            assert_gt!(point.temperature, 2000.0);
            assert_lt!(point.temperature, 3000.0);
        }
    }
    // wuestite is always the Fe-rich side of the loop
    for point in &per.points {
        assert_gt!(point.partner_fraction, point.driving_fraction);
    }
    for point in &wus.points {
        assert_gt!(point.driving_fraction, point.partner_fraction);
    }
}

#[test]
fn test_fixed_temperature_sweeps_pressure() {
    println!("🌡️ Tracing at fixed T = {}", T_FIXED);

    let tracer = BoundaryTracer::new(oracle(), mg_fe());
    let fixed = MacroConstraint::Temperature(T_FIXED);

    for names in [&["periclase", "wuestite"][..], &["alpha", "beta", "gamma"][..]] {
        let boundary = tracer.trace_boundary(&bulk(), &assemblage(names), fixed).unwrap();
        let anchor_pressure = boundary.anchor.free_value();
        println!("   {:?}: anchor P = {:.4}", names, anchor_pressure);

        assert_eq!(boundary.anchor.temperature(), T_FIXED);
        assert_eq!(anchor_pressure, boundary.anchor.pressure());
        assert_eq!(boundary.tie_line().free_value, anchor_pressure);

        for curve in &boundary.curves {
            assert_eq!(curve.len(), curve.attempted);
            for point in &curve.points {
                assert_eq!(point.temperature, T_FIXED);
                assert_eq!(point.free_value(&fixed), point.pressure);
            }

            let first = curve.points[0].pressure;
            println!("   {}: first P = {:.6}", curve.label(), first);
            assert_le!(((first - anchor_pressure) / anchor_pressure).abs(), 1e-6);

            let pressures: Vec<f64> = curve.free_values().collect();
            let rising = pressures[pressures.len() - 1] > pressures[0];
            for pair in pressures.windows(2) {
                if rising {
                    assert_lt!(pair[0], pair[1]);
                } else {
                    assert_gt!(pair[0], pair[1]);
                }
            }
        }
    }
}

#[test]
fn test_fixed_temperature_demo_job() {
    let job = PhaseDiagramJob::load(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/periclase_wuestite_fixed_temperature.json"))
        .unwrap();
    assert_eq!(job.fixed, MacroConstraint::Temperature(T_FIXED));

    let tracer = job.tracer().unwrap();
    let boundary = tracer.trace_boundary(&job.bulk, &job.assemblage().unwrap(), job.fixed).unwrap();
    assert_eq!(boundary.curves.len(), 2);
    assert!(boundary.curves.iter().all(|c| c.len() == job.tracer.steps));
}

#[test]
fn test_parallel_matches_serial() {
    println!("🧵 Testing parallel sweeps");

    let fixed = MacroConstraint::Pressure(P_FIXED);
    let a = assemblage(&["alpha", "beta", "gamma"]);
    let serial = BoundaryTracer::new(oracle(), mg_fe())
        .trace_boundary(&bulk(), &a, fixed)
        .unwrap();
    let parallel = BoundaryTracer::new(oracle(), mg_fe())
        .with_params(TracerParams { parallel: true, ..TracerParams::default() })
        .trace_boundary(&bulk(), &a, fixed)
        .unwrap();

    assert_eq!(serial, parallel);
    println!("   {} points in both", serial.total_points());
}

#[test]
fn test_explicit_branch_plan() {
    println!("🗺️ Testing explicit branch plans");

    let tracer = BoundaryTracer::new(oracle(), mg_fe())
        .with_params(TracerParams { steps: 5, ..TracerParams::default() });
    let plan = [BranchSpec { driving: 0, partner: 2, far_endpoint: 0.9 }];
    let boundary = tracer
        .trace_boundary_with(&bulk(), &assemblage(&["alpha", "beta", "gamma"]), MacroConstraint::Pressure(P_FIXED), &plan)
        .unwrap();

    assert_eq!(boundary.curves.len(), 1);
    assert_eq!(boundary.curves[0].label(), "alpha-gamma");
    assert_eq!(boundary.curves[0].len(), 5);

    let out_of_range = [BranchSpec { driving: 0, partner: 3, far_endpoint: 0.9 }];
    assert!(matches!(
        tracer.trace_boundary_with(&bulk(), &assemblage(&["alpha", "beta", "gamma"]), MacroConstraint::Pressure(P_FIXED), &out_of_range),
        Err(TracerError::InvalidSweep(_))
    ));
}

#[test]
fn test_invalid_constraints_never_reach_the_oracle() {
    println!("🛑 Testing pre-solve validation");

    let counting = FlakyOracle::new(oracle(), (2.0, 3.0));
    let two_vectors = vec![
        ExchangeVector::exchange("Mg", "Fe").unwrap(),
        ExchangeVector::exchange("Mg", "Ca").unwrap(),
    ];
    let a = assemblage(&["periclase", "wuestite"]);
    let fixed = MacroConstraint::Pressure(P_FIXED);

    let good = BoundaryTracer::new(&counting, mg_fe());
    let anchor = good.locate_anchor(&bulk(), &a, fixed).unwrap();
    let calls = counting.calls();

    let wrong_vectors = BoundaryTracer::new(&counting, two_vectors.clone());
    assert!(matches!(
        wrong_vectors.trace_branch(&bulk(), &a.phases[0], &a.phases[1], fixed, &anchor, 0.9, 5),
        Err(TracerError::ConstraintCount { expected: 4, found: 3 })
    ));

    let stranger = Phase::binary("olivine", "Mg", "Fe", 0.5).unwrap();
    assert!(matches!(
        good.trace_branch(&bulk(), &a.phases[0], &stranger, fixed, &anchor, 0.9, 5),
        Err(TracerError::UnknownPhase(_))
    ));

    let no_vectors = BoundaryTracer::new(&counting, vec![]);
    assert!(matches!(
        no_vectors.locate_anchor(&bulk(), &assemblage(&["alpha", "beta", "gamma"]), fixed),
        Err(TracerError::MissingFreeVector)
    ));

    assert_eq!(counting.calls(), calls, "oracle was called with an invalid constraint set");

    let constraints = [fixed.to_equality(), EqualityConstraint::phase_fraction("wuestite", 0.0)];
    assert!(matches!(
        validate_constraints(&a, &constraints, &two_vectors),
        Err(TracerError::ConstraintCount { expected: 4, found: 2 })
    ));
}
