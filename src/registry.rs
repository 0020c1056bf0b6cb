//! The aggregator registry: one ordered collection per metric type,
//! each mapping name to a typed aggregation cell.
//!
//! Storage is a `BTreeMap` per type rather than a single shared tree
//! with a type tag per node (the reference daemon's shape): traversal
//! order and per-type cardinality both fall out of the map directly,
//! and a name can never collide across types by construction of the
//! lookup in `Registry::apply`.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use ordered_float::OrderedFloat;

use error::Error;
use metric::{MetricType, Sample};

/// A counter or gauge cell: a single extended-precision scalar plus
/// the wall-clock time it was last touched.
#[derive(Debug, Clone)]
pub struct ScalarCell {
    /// Current accumulator value.
    pub value: f64,
    /// Epoch seconds of the most recent sample or creation.
    pub last_modified: i64,
}

/// A timer cell: a value-keyed multiset of readings plus a submission
/// count (which may exceed the multiset's cardinality when readings
/// coalesce).
#[derive(Debug, Clone, Default)]
pub struct TimerCell {
    /// Reading -> multiplicity.
    pub readings: BTreeMap<OrderedFloat<f64>, u64>,
    /// Total samples applied since the last reset.
    pub count: u64,
    /// Epoch seconds of the most recent sample.
    pub last_modified: i64,
}

impl TimerCell {
    /// Sum of value*multiplicity over all readings.
    pub fn sum(&self) -> f64 {
        self.readings
            .iter()
            .map(|(v, mult)| v.into_inner() * (*mult as f64))
            .sum()
    }

    /// Minimum reading, if any.
    pub fn min(&self) -> Option<f64> {
        self.readings.keys().next().map(|v| v.into_inner())
    }

    /// Maximum reading, if any.
    pub fn max(&self) -> Option<f64> {
        self.readings.keys().next_back().map(|v| v.into_inner())
    }

    /// Mean of all readings by multiplicity, if any were recorded.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum() / (self.count as f64))
        }
    }
}

/// A set cell: an ordered collection of unique textual values.
#[derive(Debug, Clone, Default)]
pub struct SetCell {
    /// Unique textual values seen since the last reset.
    pub values: BTreeSet<String>,
    /// Epoch seconds of the most recent sample.
    pub last_modified: i64,
}

/// The four per-type registries, kept separate so per-type
/// cardinality is always a cheap `.len()`.
#[derive(Default)]
pub struct Registry {
    counters: BTreeMap<String, ScalarCell>,
    gauges: BTreeMap<String, ScalarCell>,
    timers: BTreeMap<String, TimerCell>,
    sets: BTreeMap<String, SetCell>,
}

impl Registry {
    /// A fresh, empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// The type a name is currently bound to, if any.
    pub fn type_of(&self, name: &str) -> Option<MetricType> {
        if self.counters.contains_key(name) {
            Some(MetricType::Counter)
        } else if self.gauges.contains_key(name) {
            Some(MetricType::Gauge)
        } else if self.timers.contains_key(name) {
            Some(MetricType::Timer)
        } else if self.sets.contains_key(name) {
            Some(MetricType::Set)
        } else {
            None
        }
    }

    /// Fold one parsed sample into the registry.
    ///
    /// Returns `Err(Error::TypeConflict{..})` without mutating
    /// anything if `sample.name` is already bound to a different
    /// type; the sample is otherwise applied and the cell's
    /// last-modified timestamp set to `now`.
    pub fn apply(&mut self, sample: &Sample, now: i64) -> Result<(), Error> {
        if let Some(existing) = self.type_of(&sample.name) {
            if existing != sample.kind {
                return Err(Error::TypeConflict {
                    name: sample.name.clone(),
                    expected: existing,
                    found: sample.kind,
                });
            }
        }

        match sample.kind {
            MetricType::Counter => {
                let rate = sample.rate.unwrap_or(1.0);
                let cell = self
                    .counters
                    .entry(sample.name.clone())
                    .or_insert(ScalarCell {
                        value: 0.0,
                        last_modified: now,
                    });
                cell.value += sample.value * (1.0 / rate);
                cell.last_modified = now;
            }
            MetricType::Gauge => {
                let cell = self.gauges.entry(sample.name.clone()).or_insert(ScalarCell {
                    value: 0.0,
                    last_modified: now,
                });
                if sample.is_signed_text() {
                    cell.value += sample.value;
                } else {
                    cell.value = sample.value;
                }
                cell.last_modified = now;
            }
            MetricType::Timer => {
                let cell = self.timers.entry(sample.name.clone()).or_insert_with(TimerCell::default);
                *cell.readings.entry(OrderedFloat(sample.value)).or_insert(0) += 1;
                cell.count += 1;
                cell.last_modified = now;
            }
            MetricType::Set => {
                let cell = self.sets.entry(sample.name.clone()).or_insert_with(SetCell::default);
                cell.values.insert(sample.raw_value.clone());
                cell.last_modified = now;
            }
        }
        Ok(())
    }

    /// Ordered names of every counter cell.
    pub fn counter_names(&self) -> Vec<&String> {
        self.counters.keys().collect()
    }

    /// Ordered names of every gauge cell.
    pub fn gauge_names(&self) -> Vec<&String> {
        self.gauges.keys().collect()
    }

    /// Ordered names of every timer cell.
    pub fn timer_names(&self) -> Vec<&String> {
        self.timers.keys().collect()
    }

    /// Ordered names of every set cell.
    pub fn set_names(&self) -> Vec<&String> {
        self.sets.keys().collect()
    }

    /// Look up a counter cell by name.
    pub fn counter(&self, name: &str) -> Option<&ScalarCell> {
        self.counters.get(name)
    }

    /// Look up a gauge cell by name.
    pub fn gauge(&self, name: &str) -> Option<&ScalarCell> {
        self.gauges.get(name)
    }

    /// Look up a timer cell by name.
    pub fn timer(&self, name: &str) -> Option<&TimerCell> {
        self.timers.get(name)
    }

    /// Look up a set cell by name.
    pub fn set(&self, name: &str) -> Option<&SetCell> {
        self.sets.get(name)
    }

    /// Remove a cell of the given type, if it exists. Returns whether
    /// a cell was actually removed.
    pub fn delete(&mut self, kind: MetricType, name: &str) -> bool {
        match kind {
            MetricType::Counter => self.counters.remove(name).is_some(),
            MetricType::Gauge => self.gauges.remove(name).is_some(),
            MetricType::Timer => self.timers.remove(name).is_some(),
            MetricType::Set => self.sets.remove(name).is_some(),
        }
    }

    /// Per-type cardinalities, in Counter/Gauge/Timer/Set order.
    pub fn cardinalities(&self) -> [usize; 4] {
        [
            self.counters.len(),
            self.gauges.len(),
            self.timers.len(),
            self.sets.len(),
        ]
    }

    /// One flush tick: render every cell's records and apply its reset
    /// rule. Returns `(sub-name, value)` pairs in registry order,
    /// grouped by type in Counter/Gauge/Timer/Set order to match the
    /// list-endpoint's ordering.
    pub fn flush(&mut self) -> Vec<(String, f64)> {
        let mut out = Vec::new();

        for (name, cell) in self.counters.iter() {
            out.push((name.clone(), cell.value));
        }
        for cell in self.counters.values_mut() {
            cell.value = 0.0;
        }

        for (name, cell) in self.gauges.iter() {
            out.push((name.clone(), cell.value));
        }
        // gauges are never reset on flush.

        for (name, cell) in self.timers.iter() {
            out.push((format!("{}.count", name), cell.count as f64));
            out.push((format!("{}.sum", name), cell.sum()));
            out.push((format!("{}.upper", name), cell.max().unwrap_or(0.0)));
            out.push((format!("{}.lower", name), cell.min().unwrap_or(0.0)));
            out.push((format!("{}.mean", name), cell.mean().unwrap_or(0.0)));
        }
        for cell in self.timers.values_mut() {
            cell.readings.clear();
            cell.count = 0;
        }

        for (name, cell) in self.sets.iter() {
            out.push((format!("{}.count", name), cell.values.len() as f64));
        }
        for cell in self.sets.values_mut() {
            cell.values.clear();
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metric::MetricType;

    fn sample(name: &str, value: f64, raw: &str, kind: MetricType, rate: Option<f64>) -> Sample {
        Sample {
            name: name.to_string(),
            value,
            raw_value: raw.to_string(),
            kind,
            rate,
        }
    }

    #[test]
    fn counter_resets_on_flush() {
        let mut reg = Registry::new();
        reg.apply(&sample("gorets", 1.0, "1", MetricType::Counter, None), 1000)
            .unwrap();
        let recs = reg.flush();
        assert_eq!(recs, vec![("gorets".to_string(), 1.0)]);
        assert_eq!(reg.counter("gorets").unwrap().value, 0.0);
    }

    #[test]
    fn counter_sample_rate_scales() {
        let mut reg = Registry::new();
        reg.apply(
            &sample("gorets", 1.0, "1", MetricType::Counter, Some(0.1)),
            1000,
        )
        .unwrap();
        assert_eq!(reg.counter("gorets").unwrap().value, 10.0);
    }

    #[test]
    fn gauge_additive_vs_absolute() {
        let mut reg = Registry::new();
        reg.apply(&sample("gaugor", 333.0, "333", MetricType::Gauge, None), 1)
            .unwrap();
        reg.apply(&sample("gaugor", 10.0, "+10", MetricType::Gauge, None), 1)
            .unwrap();
        reg.apply(&sample("gaugor", -3.0, "-3", MetricType::Gauge, None), 1)
            .unwrap();
        assert_eq!(reg.gauge("gaugor").unwrap().value, 340.0);
        reg.apply(&sample("gaugor", 100.0, "100", MetricType::Gauge, None), 1)
            .unwrap();
        assert_eq!(reg.gauge("gaugor").unwrap().value, 100.0);
        let recs = reg.flush();
        assert_eq!(recs, vec![("gaugor".to_string(), 100.0)]);
        assert_eq!(reg.gauge("gaugor").unwrap().value, 100.0);
    }

    #[test]
    fn timer_stats_and_reset() {
        let mut reg = Registry::new();
        for v in [320.0, 100.0, 320.0] {
            reg.apply(
                &sample("glork", v, &v.to_string(), MetricType::Timer, None),
                1,
            )
            .unwrap();
        }
        let recs = reg.flush();
        let map: std::collections::HashMap<_, _> = recs.into_iter().collect();
        assert_eq!(map["glork.count"], 3.0);
        assert_eq!(map["glork.sum"], 740.0);
        assert_eq!(map["glork.upper"], 320.0);
        assert_eq!(map["glork.lower"], 100.0);
        assert!((map["glork.mean"] - 246.666_666_7).abs() < 1e-4);
        assert_eq!(reg.timer("glork").unwrap().count, 0);
        assert!(reg.timer("glork").unwrap().readings.is_empty());
    }

    #[test]
    fn set_cardinality_and_clear() {
        let mut reg = Registry::new();
        reg.apply(&sample("uniques", 765.0, "765", MetricType::Set, None), 1)
            .unwrap();
        reg.apply(&sample("uniques", 765.0, "765", MetricType::Set, None), 1)
            .unwrap();
        reg.apply(&sample("uniques", 766.0, "766", MetricType::Set, None), 1)
            .unwrap();
        assert_eq!(reg.set("uniques").unwrap().values.len(), 2);
        let recs = reg.flush();
        assert_eq!(recs, vec![("uniques.count".to_string(), 2.0)]);
        assert!(reg.set("uniques").unwrap().values.is_empty());
    }

    #[test]
    fn type_conflict_leaves_cell_untouched() {
        let mut reg = Registry::new();
        reg.apply(&sample("x", 1.0, "1", MetricType::Counter, None), 1)
            .unwrap();
        let err = reg
            .apply(&sample("x", 1.0, "1", MetricType::Gauge, None), 1)
            .unwrap_err();
        match err {
            Error::TypeConflict { name, .. } => assert_eq!(name, "x"),
            _ => panic!("expected TypeConflict"),
        }
        assert_eq!(reg.counter("x").unwrap().value, 1.0);
        assert!(reg.gauge("x").is_none());
    }

    #[test]
    fn delete_removes_cell_and_cardinality() {
        let mut reg = Registry::new();
        reg.apply(&sample("x", 1.0, "1", MetricType::Counter, None), 1)
            .unwrap();
        assert_eq!(reg.cardinalities()[0], 1);
        assert!(reg.delete(MetricType::Counter, "x"));
        assert_eq!(reg.cardinalities()[0], 0);
        assert!(reg.counter("x").is_none());
    }
}
