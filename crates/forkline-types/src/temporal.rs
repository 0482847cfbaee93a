use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Largest magnitude at which every integer is exactly representable.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Primary ordering key of an event.
///
/// Logical counter or wall-clock reading, chosen by the producer. Any finite
/// number is accepted, so an event can be placed between two existing
/// timestamps (`0.5` between `0` and `1`). Timestamps are not required to be
/// unique, nor monotonic with respect to the order in which events are
/// appended; equal timestamps are disambiguated by
/// [`EventId`](crate::EventId) in the canonical order.
///
/// NaN and infinities are rejected at construction, and `-0.0` is stored as
/// `0.0`, so equality, hashing and ordering all agree.
#[derive(Clone, Copy, Default)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Create a timestamp from an integral value.
    ///
    /// Values beyond ±2^53 are rounded to the nearest representable number.
    pub fn new(value: i64) -> Self {
        Self(value as f64)
    }

    /// Create a timestamp from any finite number.
    pub fn from_f64(value: f64) -> Result<Self, TypeError> {
        if !value.is_finite() {
            return Err(TypeError::InvalidTimestamp(format!(
                "{value} is not a finite number"
            )));
        }
        // Folds -0.0 into 0.0.
        Ok(Self(value + 0.0))
    }

    /// The raw value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// The value as an integer, when it is one and converts exactly.
    pub fn as_integer(&self) -> Option<i64> {
        (self.0.fract() == 0.0 && self.0.abs() <= EXACT_INTEGER_LIMIT).then_some(self.0 as i64)
    }

    /// Returns `true` if this timestamp is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns `true` if this timestamp is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Timestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<i32> for Timestamp {
    fn from(value: i32) -> Self {
        Self(f64::from(value))
    }
}

impl From<u32> for Timestamp {
    fn from(value: u32) -> Self {
        Self(f64::from(value))
    }
}

impl TryFrom<f64> for Timestamp {
    type Error = TypeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_f64(value)
    }
}

impl FromStr for Timestamp {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<f64>()
            .map_err(|e| TypeError::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Self::from_f64(value)
    }
}

/// Integral values are written as JSON integers, everything else as floats.
impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_integer() {
            Some(n) => serializer.serialize_i64(n),
            None => serializer.serialize_f64(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Self::from_f64(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn ts(value: f64) -> Timestamp {
        Timestamp::from_f64(value).unwrap()
    }

    #[test]
    fn ordering_follows_value() {
        assert!(Timestamp::new(-1) < Timestamp::new(0));
        assert!(Timestamp::new(2).is_after(&Timestamp::new(1)));
        assert!(Timestamp::new(1).is_before(&Timestamp::new(2)));
        assert!(!Timestamp::new(3).is_after(&Timestamp::new(3)));
    }

    #[test]
    fn fractional_values_sit_between_integers() {
        let half = ts(0.5);
        assert!(half.is_after(&Timestamp::new(0)));
        assert!(half.is_before(&Timestamp::new(1)));
        assert_eq!(ts(2.0), Timestamp::new(2));
    }

    #[test]
    fn rejects_non_finite() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                Timestamp::from_f64(bad),
                Err(TypeError::InvalidTimestamp(_))
            ));
        }
    }

    #[test]
    fn negative_zero_equals_zero() {
        let neg = ts(-0.0);
        assert_eq!(neg, Timestamp::new(0));
        assert_eq!(neg.cmp(&Timestamp::new(0)), Ordering::Equal);
        let set: HashSet<Timestamp> = [neg, Timestamp::new(0)].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn parse_from_str() {
        assert_eq!("42".parse::<Timestamp>().unwrap(), Timestamp::new(42));
        assert_eq!(" -7 ".parse::<Timestamp>().unwrap(), Timestamp::new(-7));
        assert_eq!("2.25".parse::<Timestamp>().unwrap(), ts(2.25));
        assert!(matches!(
            "soon".parse::<Timestamp>(),
            Err(TypeError::InvalidTimestamp(_))
        ));
        assert!("NaN".parse::<Timestamp>().is_err());
    }

    #[test]
    fn serializes_as_bare_number() {
        assert_eq!(serde_json::to_string(&Timestamp::new(15)).unwrap(), "15");
        assert_eq!(serde_json::to_string(&ts(1.5)).unwrap(), "1.5");
        let parsed: Timestamp = serde_json::from_str("15").unwrap();
        assert_eq!(parsed, Timestamp::new(15));
        let parsed: Timestamp = serde_json::from_str("0.5").unwrap();
        assert_eq!(parsed, ts(0.5));
        assert!(serde_json::from_str::<Timestamp>("\"15\"").is_err());
    }

    #[test]
    fn integer_view() {
        assert_eq!(Timestamp::new(-3).as_integer(), Some(-3));
        assert_eq!(ts(1.5).as_integer(), None);
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", Timestamp::new(1000)), "1000");
        assert_eq!(format!("{}", ts(0.25)), "0.25");
        assert_eq!(format!("{:?}", Timestamp::new(5)), "t5");
    }
}
