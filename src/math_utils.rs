//! Mathematical utility functions for the tracer and the relaxation driver
//!
//! This module provides interpolation, evenly spaced sweeps and scalar root
//! finding used throughout the crate.

/// Assert that the deviation between two values is less than a threshold
///
/// This macro combines deviation calculation with assertion for cleaner test code.
/// It calculates the percentage deviation between `actual` and `expected`, then
/// asserts that this deviation is less than the specified `max_deviation`.
///
/// # Examples
/// See the test cases below for usage examples.
#[macro_export]
macro_rules! assert_deviation {
    ($actual:expr, $expected:expr, $max_deviation:expr) => {
        {
            let actual_val = $actual;
            let expected_val = $expected;
            let max_dev = $max_deviation;
            let actual_deviation = $crate::math_utils::deviation(actual_val, expected_val);

            if actual_deviation >= max_dev {
                panic!(
                    "assertion failed: deviation {:.2e}% >= {:.2e}%\n  actual: {:?},\n  expected: {:?}",
                    actual_deviation, max_dev, actual_val, expected_val
                );
            }
        }
    };
    ($actual:expr, $expected:expr, $max_deviation:expr, $($arg:tt)+) => {
        {
            let actual_val = $actual;
            let expected_val = $expected;
            let max_dev = $max_deviation;
            let actual_deviation = $crate::math_utils::deviation(actual_val, expected_val);

            if actual_deviation >= max_dev {
                panic!(
                    "assertion failed: deviation {:.2e}% >= {:.2e}%: {}\n  actual: {:?},\n  expected: {:?}",
                    actual_deviation, max_dev, format_args!($($arg)+), actual_val, expected_val
                );
            }
        }
    };
}

/// Linear interpolation between two values
///
/// # Arguments
/// * `a` - Start value
/// * `b` - End value
/// * `ratio` - Interpolation ratio (0.0 = a, 1.0 = b)
///
/// # Examples
/// ```
/// use mineral_phase_rust::math_utils::lerp;
///
/// assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
/// assert_eq!(lerp(100.0, 200.0, 0.25), 125.0);
/// ```
pub fn lerp(a: f64, b: f64, ratio: f64) -> f64 {
    a + (b - a) * ratio
}

/// Calculate the percentage deviation between two values
///
/// Uses the expected value as the reference (base) for the percentage calculation.
///
/// # Examples
/// ```
/// use mineral_phase_rust::math_utils::deviation;
///
/// // 105 is 5% higher than 100
/// assert_eq!(deviation(105.0, 100.0), 5.0);
/// assert_eq!(deviation(95.0, 100.0), 5.0);
/// ```
pub fn deviation(actual: f64, expected: f64) -> f64 {
    if expected.abs() < f64::EPSILON {
        if actual.abs() < f64::EPSILON {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        ((actual - expected).abs() / expected.abs()) * 100.0
    }
}

/// Evenly spaced values from `start` to `end`, both inclusive.
///
/// Lazy: values are produced on demand. The final value is exactly `end`.
///
/// ```
/// use mineral_phase_rust::math_utils::Linspace;
///
/// let xs: Vec<f64> = Linspace::new(0.0, 1.0, 5).collect();
/// assert_eq!(xs, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
/// ```
#[derive(Debug, Clone)]
pub struct Linspace {
    start: f64,
    end: f64,
    steps: usize,
    index: usize,
}

impl Linspace {
    pub fn new(start: f64, end: f64, steps: usize) -> Self {
        Self { start, end, steps, index: 0 }
    }

    fn value_at(&self, index: usize) -> f64 {
        if self.steps <= 1 || index == 0 {
            self.start
        } else if index == self.steps - 1 {
            self.end
        } else {
            lerp(self.start, self.end, index as f64 / (self.steps - 1) as f64)
        }
    }
}

impl Iterator for Linspace {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.index >= self.steps {
            return None;
        }
        let value = self.value_at(self.index);
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.steps - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Linspace {}

/// An interval known to contain a sign change of some function.
#[derive(Debug, Clone, Copy)]
pub struct Bracket {
    pub lo: f64,
    pub hi: f64,
    pub f_lo: f64,
    pub f_hi: f64,
}

/// Search outward from `x0` for an interval on which `f` changes sign.
///
/// The search width doubles on every expansion, starting at `step`. Points
/// below `lower_bound` are clamped to it. Returns `None` if `f` is not finite
/// somewhere along the way or no sign change turns up.
pub fn bracket_root<F: FnMut(f64) -> f64>(
    mut f: F,
    x0: f64,
    step: f64,
    lower_bound: Option<f64>,
    max_expansions: usize,
) -> Option<Bracket> {
    let x0 = match lower_bound {
        Some(bound) if x0 < bound => bound,
        _ => x0,
    };
    let f0 = f(x0);
    if !f0.is_finite() {
        return None;
    }
    if f0 == 0.0 {
        return Some(Bracket { lo: x0, hi: x0, f_lo: f0, f_hi: f0 });
    }

    let mut width = step.abs().max(f64::EPSILON);
    for _ in 0..max_expansions {
        let mut lo = x0 - width;
        if let Some(bound) = lower_bound {
            lo = lo.max(bound);
        }
        let hi = x0 + width;

        if lo < x0 {
            let f_lo = f(lo);
            if !f_lo.is_finite() {
                return None;
            }
            if f_lo * f0 <= 0.0 {
                return Some(Bracket { lo, hi: x0, f_lo, f_hi: f0 });
            }
        }

        let f_hi = f(hi);
        if !f_hi.is_finite() {
            return None;
        }
        if f0 * f_hi <= 0.0 {
            return Some(Bracket { lo: x0, hi, f_lo: f0, f_hi });
        }

        width *= 2.0;
    }
    None
}

/// Illinois variant of false position on a sign-changing bracket.
///
/// Returns the root and the number of function evaluations spent, or `None`
/// if `f` goes non-finite or the iteration budget runs out.
pub fn solve_bracketed<F: FnMut(f64) -> f64>(
    mut f: F,
    bracket: Bracket,
    tolerance: f64,
    max_iterations: usize,
) -> Option<(f64, usize)> {
    let Bracket { lo: mut a, hi: mut b, f_lo: mut fa, f_hi: mut fb } = bracket;
    if fa == 0.0 {
        return Some((a, 0));
    }
    if fb == 0.0 {
        return Some((b, 0));
    }

    // -1: last update replaced `b`, 1: last update replaced `a`
    let mut side = 0;
    for iteration in 1..=max_iterations {
        let c = (a * fb - b * fa) / (fb - fa);
        let fc = f(c);
        if !fc.is_finite() {
            return None;
        }
        if fc.abs() < tolerance || (b - a).abs() <= 4.0 * f64::EPSILON * (1.0 + c.abs()) {
            return Some((c, iteration));
        }

        if fc * fb > 0.0 {
            b = c;
            fb = fc;
            if side == -1 {
                fa *= 0.5;
            }
            side = -1;
        } else if fa * fc > 0.0 {
            a = c;
            fa = fc;
            if side == 1 {
                fb *= 0.5;
            }
            side = 1;
        } else {
            return Some((c, iteration));
        }
    }
    None
}
