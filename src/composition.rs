//! Bulk and site compositions, and the exchange vectors that let a solver
//! move a bulk composition along a fixed direction (e.g. Mg ↔ Fe).

use crate::error::{TracerError, TracerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Element symbol → non-negative molar amount.
///
/// Ordered so that anything derived from it (logs, CSV, solver input) is
/// deterministic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct Composition {
    amounts: BTreeMap<String, f64>,
}

impl Composition {
    pub fn new(amounts: BTreeMap<String, f64>) -> TracerResult<Self> {
        if amounts.is_empty() {
            return Err(TracerError::InvalidComposition("composition is empty".into()));
        }
        for (element, amount) in &amounts {
            if !amount.is_finite() || *amount < 0.0 {
                return Err(TracerError::InvalidComposition(format!(
                    "{} has amount {}, expected a finite non-negative value",
                    element, amount
                )));
            }
        }
        if !amounts.values().any(|amount| *amount > 0.0) {
            return Err(TracerError::InvalidComposition(
                "at least one element must have a positive amount".into(),
            ));
        }
        Ok(Self { amounts })
    }

    /// Build from `(symbol, amount)` pairs.
    ///
    /// ```
    /// use mineral_phase_rust::composition::Composition;
    ///
    /// let fp = Composition::from_pairs(&[("Fe", 0.5), ("Mg", 0.5), ("O", 1.0)]).unwrap();
    /// assert_eq!(fp.amount("O"), 1.0);
    /// assert_eq!(fp.amount("Si"), 0.0);
    /// ```
    pub fn from_pairs(pairs: &[(&str, f64)]) -> TracerResult<Self> {
        let mut amounts = BTreeMap::new();
        for (element, amount) in pairs {
            *amounts.entry(element.to_string()).or_insert(0.0) += amount;
        }
        Self::new(amounts)
    }

    pub fn amount(&self, element: &str) -> f64 {
        self.amounts.get(element).copied().unwrap_or(0.0)
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.amounts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn total(&self) -> f64 {
        self.amounts.values().sum()
    }

    /// Fraction of `minor` within the pair `(major, minor)`, e.g. `Fe / (Mg + Fe)`.
    pub fn pair_fraction(&self, major: &str, minor: &str) -> TracerResult<f64> {
        let a = self.amount(major);
        let b = self.amount(minor);
        if a + b <= 0.0 {
            return Err(TracerError::InvalidComposition(format!(
                "neither {} nor {} is present",
                major, minor
            )));
        }
        Ok(b / (a + b))
    }

    /// Move the composition by `amount` along `vector`.
    pub fn shifted(&self, vector: &ExchangeVector, amount: f64) -> TracerResult<Self> {
        let mut amounts = self.amounts.clone();
        for (element, coefficient) in vector.iter() {
            let entry = amounts.entry(element.to_string()).or_insert(0.0);
            *entry += coefficient * amount;
            // round-off can leave a consumed element a hair below zero
            if *entry < 0.0 && *entry > -1e-12 {
                *entry = 0.0;
            }
        }
        Self::new(amounts)
    }

    /// Shift along `vector` until `minor / (major + minor)` equals `target`.
    ///
    /// Returns `None` when the vector cannot change that ratio.
    pub fn shifted_to_pair_fraction(
        &self,
        vector: &ExchangeVector,
        major: &str,
        minor: &str,
        target: f64,
    ) -> Option<TracerResult<Self>> {
        let a = self.amount(major);
        let b = self.amount(minor);
        let va = vector.coefficient(major);
        let vb = vector.coefficient(minor);
        // (b + t vb) = target (a + b + t (va + vb))
        let denominator = vb - target * (va + vb);
        if denominator.abs() < f64::EPSILON {
            return None;
        }
        let t = (target * (a + b) - b) / denominator;
        Some(self.shifted(vector, t))
    }
}

impl TryFrom<BTreeMap<String, f64>> for Composition {
    type Error = TracerError;

    fn try_from(amounts: BTreeMap<String, f64>) -> TracerResult<Self> {
        Self::new(amounts)
    }
}

impl From<Composition> for BTreeMap<String, f64> {
    fn from(composition: Composition) -> Self {
        composition.amounts
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(e, a)| format!("{}: {}", e, a)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A free compositional direction, e.g. `{Mg: 1, Fe: -1}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ExchangeVector {
    coefficients: BTreeMap<String, f64>,
}

impl ExchangeVector {
    pub fn new(coefficients: BTreeMap<String, f64>) -> TracerResult<Self> {
        if coefficients.values().any(|c| !c.is_finite()) {
            return Err(TracerError::InvalidComposition(
                "exchange vector coefficients must be finite".into(),
            ));
        }
        if !coefficients.values().any(|c| *c != 0.0) {
            return Err(TracerError::InvalidComposition(
                "exchange vector has no non-zero coefficient".into(),
            ));
        }
        Ok(Self { coefficients })
    }

    /// `{gained: +1, lost: -1}`
    pub fn exchange(gained: &str, lost: &str) -> TracerResult<Self> {
        let mut coefficients = BTreeMap::new();
        coefficients.insert(gained.to_string(), 1.0);
        coefficients.insert(lost.to_string(), -1.0);
        Self::new(coefficients)
    }

    pub fn coefficient(&self, element: &str) -> f64 {
        self.coefficients.get(element).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.coefficients.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl TryFrom<BTreeMap<String, f64>> for ExchangeVector {
    type Error = TracerError;

    fn try_from(coefficients: BTreeMap<String, f64>) -> TracerResult<Self> {
        Self::new(coefficients)
    }
}

impl From<ExchangeVector> for BTreeMap<String, f64> {
    fn from(vector: ExchangeVector) -> Self {
        vector.coefficients
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ferropericlase() -> Composition {
        Composition::from_pairs(&[("Fe", 0.5), ("Mg", 0.5), ("O", 1.0)]).unwrap()
    }

    #[test]
    fn test_rejects_bad_amounts() {
        assert!(Composition::from_pairs(&[]).is_err());
        assert!(Composition::from_pairs(&[("Fe", -0.1), ("O", 1.0)]).is_err());
        assert!(Composition::from_pairs(&[("Fe", 0.0), ("Mg", 0.0)]).is_err());
        assert!(Composition::from_pairs(&[("Fe", f64::NAN)]).is_err());
    }

    #[test]
    fn test_pair_fraction() {
        let bulk = ferropericlase();
        assert_abs_diff_eq!(bulk.pair_fraction("Mg", "Fe").unwrap(), 0.5);
        assert!(bulk.pair_fraction("Ca", "Na").is_err());
    }

    #[test]
    fn test_shift_along_exchange_vector_keeps_total() {
        let bulk = ferropericlase();
        let mg_fe = ExchangeVector::exchange("Mg", "Fe").unwrap();
        let shifted = bulk.shifted(&mg_fe, 0.2).unwrap();

        assert_abs_diff_eq!(shifted.amount("Mg"), 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(shifted.amount("Fe"), 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(shifted.total(), bulk.total(), epsilon = 1e-12);
    }

    #[test]
    fn test_shift_to_target_fraction() {
        let bulk = ferropericlase();
        let mg_fe = ExchangeVector::exchange("Mg", "Fe").unwrap();
        let shifted = bulk
            .shifted_to_pair_fraction(&mg_fe, "Mg", "Fe", 0.2)
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(shifted.pair_fraction("Mg", "Fe").unwrap(), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(shifted.amount("O"), 1.0);
    }

    #[test]
    fn test_shift_beyond_available_amount_fails() {
        let bulk = ferropericlase();
        let mg_fe = ExchangeVector::exchange("Mg", "Fe").unwrap();
        assert!(bulk.shifted(&mg_fe, 0.8).is_err());
    }

    #[test]
    fn test_vector_that_cannot_move_the_ratio() {
        let bulk = ferropericlase();
        let oxygen = ExchangeVector::new(BTreeMap::from([("O".to_string(), 1.0)])).unwrap();
        assert!(bulk.shifted_to_pair_fraction(&oxygen, "Mg", "Fe", 0.3).is_none());
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let parsed: Composition = serde_json::from_str(r#"{"Fe": 0.5, "Mg": 0.5, "O": 1.0}"#).unwrap();
        assert_eq!(parsed, ferropericlase());
        assert!(serde_json::from_str::<Composition>(r#"{"Fe": -1.0}"#).is_err());
        assert!(serde_json::from_str::<ExchangeVector>(r#"{"Mg": 0.0}"#).is_err());
    }
}
