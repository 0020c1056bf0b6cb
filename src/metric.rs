//! Shared types for the aggregation pipeline: metric types and parsed
//! samples. Everything downstream of the parser (registry, sink,
//! HTTP surface) speaks in terms of these.

use std::fmt;

/// The four metric types the line protocol supports.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricType {
    /// Monotonic-per-flush accumulator with sample-rate scaling.
    Counter,
    /// Absolute-or-additive scalar, never reset.
    Gauge,
    /// Value-keyed multiset of readings.
    Timer,
    /// Set of unique textual values.
    Set,
}

impl MetricType {
    /// The HTTP path component for this type's list/per-metric endpoints.
    pub fn path_component(&self) -> &'static str {
        match *self {
            MetricType::Counter => "counters",
            MetricType::Gauge => "gauges",
            MetricType::Timer => "timers",
            MetricType::Set => "sets",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.path_component())
    }
}

/// One parsed sample off the wire, prior to application to a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The metric name.
    pub name: String,
    /// The parsed numeric value.
    pub value: f64,
    /// The original, unparsed text of the value field. Needed because
    /// gauge additivity is keyed on the *text's* leading sign, not the
    /// parsed value's sign, and set uniqueness is keyed on this text.
    pub raw_value: String,
    /// The sample's metric type.
    pub kind: MetricType,
    /// The optional sample rate, already divided into: a rate of 0.1
    /// means this sample represents 10 occurrences.
    pub rate: Option<f64>,
}

impl Sample {
    /// True if this sample's original text opens with an explicit sign,
    /// making a GAUGE sample additive rather than absolute.
    pub fn is_signed_text(&self) -> bool {
        matches!(self.raw_value.as_bytes().first(), Some(b'+') | Some(b'-'))
    }
}
