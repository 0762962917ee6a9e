//! Unit tokens attached to recorded measurements.
//!
//! Units are opaque strings to the aggregation pipeline. The only token with a meaning is
//! [`COUNTER`], which marks values that are summed instead of retained. [`MetricUnit`] offers the
//! tokens understood by the ingestion endpoint as a typed enum, but any string is accepted
//! wherever a unit is expected.

use std::fmt;
use std::str::FromStr;

/// The reserved unit token marking a counter.
///
/// Counters are never emitted with a unit suffix on the wire.
pub const COUNTER: &str = "c";

/// Returns `true` if the given (already normalized) unit token denotes a counter.
#[inline]
pub fn is_counter(unit: &str) -> bool {
    unit == COUNTER
}

/// A measurement unit understood by the ingestion endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MetricUnit {
    /// Nanoseconds, `ns`.
    NanoSecond,
    /// Microseconds, `us`.
    MicroSecond,
    /// Milliseconds, `ms`.
    MilliSecond,
    /// Seconds, `s`.
    Second,
    /// Minutes, `m`.
    Minute,
    /// Hours, `h`.
    Hour,
    /// Bytes, `b`.
    Byte,
    /// Kilobytes, `kb`.
    KiloByte,
    /// Megabytes, `mb`.
    MegaByte,
    /// Gigabytes, `gb`.
    GigaByte,
    /// Terabytes, `tb`.
    TeraByte,
    /// Bits per second, `bps`.
    BitPerSecond,
    /// Kilobits per second, `kbps`.
    KiloBitPerSecond,
    /// Megabits per second, `mbps`.
    MegaBitPerSecond,
    /// Gigabits per second, `gbps`.
    GigaBitPerSecond,
    /// Terabits per second, `tbps`.
    TeraBitPerSecond,
    /// A ratio in percent, `p`.
    Percent,
    /// A dimensionless value, rendered as the empty string.
    None,
}

impl MetricUnit {
    /// Returns the wire token of this unit.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoSecond => "ns",
            Self::MicroSecond => "us",
            Self::MilliSecond => "ms",
            Self::Second => "s",
            Self::Minute => "m",
            Self::Hour => "h",
            Self::Byte => "b",
            Self::KiloByte => "kb",
            Self::MegaByte => "mb",
            Self::GigaByte => "gb",
            Self::TeraByte => "tb",
            Self::BitPerSecond => "bps",
            Self::KiloBitPerSecond => "kbps",
            Self::MegaBitPerSecond => "mbps",
            Self::GigaBitPerSecond => "gbps",
            Self::TeraBitPerSecond => "tbps",
            Self::Percent => "p",
            Self::None => "",
        }
    }
}

impl AsRef<str> for MetricUnit {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error returned when parsing an unknown [`MetricUnit`].
#[derive(Clone, Copy, Debug)]
pub struct ParseMetricUnitError(());

impl fmt::Display for ParseMetricUnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown metric unit")
    }
}

impl std::error::Error for ParseMetricUnitError {}

impl FromStr for MetricUnit {
    type Err = ParseMetricUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "ns" => Self::NanoSecond,
            "us" => Self::MicroSecond,
            "ms" => Self::MilliSecond,
            "s" => Self::Second,
            "m" => Self::Minute,
            "h" => Self::Hour,
            "b" => Self::Byte,
            "kb" => Self::KiloByte,
            "mb" => Self::MegaByte,
            "gb" => Self::GigaByte,
            "tb" => Self::TeraByte,
            "bps" => Self::BitPerSecond,
            "kbps" => Self::KiloBitPerSecond,
            "mbps" => Self::MegaBitPerSecond,
            "gbps" => Self::GigaBitPerSecond,
            "tbps" => Self::TeraBitPerSecond,
            "p" => Self::Percent,
            "" => Self::None,
            _ => return Err(ParseMetricUnitError(())),
        })
    }
}

impl_str_serde!(MetricUnit, "a metric unit string");
