use std::borrow::Borrow;
use std::fmt;

use hive_common::unit;

/// A single measurement emitted by application code.
///
/// Events are immutable once created. They carry the raw dimension string of the handle that
/// emitted them; canonicalization only happens when the accumulator is flushed.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricEvent {
    /// Raw dimension string, a comma separated list of `key=value` pairs.
    pub dimensions: String,
    /// Name of the metric.
    pub name: String,
    /// Unit token. [`unit::COUNTER`] marks a counter.
    pub unit: String,
    /// The measured value.
    pub value: f64,
}

impl MetricEvent {
    /// Creates a new event.
    pub fn new(
        dimensions: impl Into<String>,
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            dimensions: dimensions.into(),
            name: name.into(),
            unit: unit.into(),
            value,
        }
    }

    /// Returns `true` if the value may enter an accumulator.
    ///
    /// Negative and non-finite values are rejected.
    pub fn is_valid(&self) -> bool {
        is_valid_value(self.value)
    }

    /// Returns the identity of the metric within its dimension bucket.
    pub fn key(&self) -> MetricKey {
        MetricKey::new(&self.name, &self.unit)
    }
}

/// Returns `true` if a value may be recorded.
pub fn is_valid_value(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Identity of a metric within a dimension bucket: `<name>|<unit>`.
///
/// The name is trimmed, the unit is trimmed and lowercased. Two events with the same key in the
/// same bucket are merged.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MetricKey(String);

impl MetricKey {
    /// Creates a key from a metric name and a unit token.
    pub fn new(name: &str, unit: &str) -> Self {
        let unit = unit.trim().to_lowercase();
        Self(format!("{}|{unit}", name.trim()))
    }

    /// Creates a key from its string form without normalizing it.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the string form of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the metric name, which is everything before the first `|`.
    pub fn name(&self) -> &str {
        self.0.split('|').next().unwrap_or_default()
    }

    /// Returns `true` if this key denotes a counter.
    pub fn is_counter(&self) -> bool {
        self.0
            .strip_suffix(unit::COUNTER)
            .is_some_and(|rest| rest.ends_with('|'))
    }

    /// Splits the key into the metric name and the unit suffix written to the wire.
    ///
    /// Keys that do not consist of exactly a name and a unit are written out whole, without a
    /// suffix. The counter unit is never written.
    pub fn wire_parts(&self) -> (&str, &str) {
        let mut parts = self.0.split('|');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(unit), None) if unit::is_counter(unit) => (name, ""),
            (Some(name), Some(unit), None) => (name, unit),
            _ => (self.0.as_str(), ""),
        }
    }

    pub(crate) fn trimmed(&self) -> Self {
        Self(self.0.trim().to_owned())
    }
}

impl Borrow<str> for MetricKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
