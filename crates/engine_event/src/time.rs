//! Virtual time.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// A point in virtual time.
///
/// Wraps an `f64` that is never NaN, ordered with [`f64::total_cmp`] so it
/// can key ordered maps. `+∞` is representable (an unbounded horizon) but
/// never accepted as an event time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SimTime(f64);

impl SimTime {
    /// The start of every simulation.
    pub const ZERO: Self = Self(0.0);

    /// Later than every schedulable time.
    pub const INFINITY: Self = Self(f64::INFINITY);

    /// Wrap `t`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidTime`] for NaN.
    pub fn new(t: f64) -> Result<Self, EventError> {
        if t.is_nan() {
            return Err(EventError::InvalidTime(t));
        }
        // Normalise -0.0 so equal instants compare equal under total_cmp.
        Ok(Self(t + 0.0))
    }

    /// The raw value.
    #[must_use]
    pub const fn as_f64(self) -> f64 {
        self.0
    }

    /// Returns `true` unless this is an infinity.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl TryFrom<f64> for SimTime {
    type Error = EventError;

    fn try_from(t: f64) -> Result<Self, EventError> {
        Self::new(t)
    }
}

impl From<SimTime> for f64 {
    fn from(t: SimTime) -> Self {
        t.0
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t={}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_rejected() {
        assert!(matches!(
            SimTime::new(f64::NAN),
            Err(EventError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_ordering_and_negative_zero() {
        let a = SimTime::new(3.0).unwrap();
        let b = SimTime::new(5.0).unwrap();
        assert!(a < b);
        assert!(b < SimTime::INFINITY);
        assert_eq!(SimTime::new(-0.0).unwrap(), SimTime::ZERO);
    }

    #[test]
    fn test_serde_as_plain_number() {
        let t = SimTime::new(2.5).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "2.5");
        let back: SimTime = serde_json::from_str("2.5").unwrap();
        assert_eq!(back, t);
    }
}
