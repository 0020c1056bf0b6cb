//! The single thread that owns the registry.
//!
//! Every registry mutation and traversal must run to completion
//! without yielding, so everything funnels through a single task
//! reached by channel. This module is that funnel: every other
//! thread (UDP ingest, the two sink-flush tickers, the HTTP admin
//! surface, self-telemetry) talks to the registry only by sending a
//! `Command` here and, where a reply is expected, waiting on a
//! bundled one-shot channel.

use std::sync::mpsc::{Receiver, Sender};
use std::time::Instant;

use error::Error;
use metric::{MetricType, Sample};
use registry::Registry;
use time;

/// A snapshot of one cell, shaped for the HTTP per-metric endpoint
/// without borrowing from the registry (the aggregator thread
/// cannot hand out a reference across the channel boundary).
#[derive(Debug, Clone)]
pub enum CellView {
    /// COUNTER/GAUGE: `{"name","value","last_modified"}`.
    Scalar { value: f64, last_modified: i64 },
    /// TIMER: `{"name","last_modified","values"}`, each reading
    /// repeated by its multiplicity, ascending.
    Timer {
        values: Vec<f64>,
        last_modified: i64,
    },
    /// SET: `{"name","last_modified","values"}`, ascending textual order.
    Set {
        values: Vec<String>,
        last_modified: i64,
    },
}

/// A snapshot of the daemon's internal counters for the self-telemetry
/// sampler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetrySnapshot {
    /// Cumulative bytes received across all ingest datagrams.
    pub bytes_rx: u64,
    /// Cumulative datagrams received.
    pub packets_rx: u64,
    /// Cumulative samples successfully applied.
    pub metrics_rx: u64,
    /// Cumulative microseconds spent on registry lookups during ingest.
    pub search_mus: u64,
    /// Current cardinality of each type, Counter/Gauge/Timer/Set order.
    pub cardinalities: [usize; 4],
}

/// Everything another thread can ask the aggregator to do.
pub enum Command {
    /// Apply one datagram's already-parsed samples. `len` is the raw
    /// datagram's byte length, used for the bytes-in counter even
    /// though parse errors discard the bytes of bad samples.
    Ingest {
        /// Samples successfully parsed out of this datagram.
        samples: Vec<Sample>,
        /// Byte length of the originating datagram.
        len: usize,
    },
    /// Render and reset every cell for one flush tick.
    Flush {
        /// Where to send the rendered `(sub-name, value)` records.
        reply: Sender<Vec<(String, f64)>>,
    },
    /// `GET /P(T)`: list names of the given type, in registry order.
    HttpList {
        kind: MetricType,
        reply: Sender<Vec<String>>,
    },
    /// `GET /P(T)/<name>`: fetch one cell's view, if it exists.
    HttpGet {
        kind: MetricType,
        name: String,
        reply: Sender<Option<CellView>>,
    },
    /// `DELETE /P(T)/<name>`: remove a cell. Reply is whether a cell
    /// actually existed to remove.
    HttpDelete {
        kind: MetricType,
        name: String,
        reply: Sender<bool>,
    },
    /// A self-telemetry tick: snapshot the counters below.
    SelfTelemetry { reply: Sender<TelemetrySnapshot> },
    /// Terminate the aggregator loop.
    Shutdown,
}

/// The aggregator thread's owned state: the registry plus the
/// ingest-side counters that feed self-telemetry.
pub struct Aggregator {
    registry: Registry,
    bytes_rx: u64,
    packets_rx: u64,
    metrics_rx: u64,
    search_mus: u64,
}

impl Aggregator {
    /// A fresh aggregator with an empty registry and zeroed counters.
    pub fn new() -> Aggregator {
        Aggregator {
            registry: Registry::new(),
            bytes_rx: 0,
            packets_rx: 0,
            metrics_rx: 0,
            search_mus: 0,
        }
    }

    /// Run the command loop until `Command::Shutdown` is received or
    /// the channel hangs up.
    pub fn run(mut self, commands: Receiver<Command>) {
        while let Ok(cmd) = commands.recv() {
            if !self.dispatch(cmd) {
                break;
            }
        }
    }

    /// Handle one command. Returns `false` if the loop should stop.
    fn dispatch(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Ingest { samples, len } => {
                self.bytes_rx += len as u64;
                self.packets_rx += 1;
                let now = time::now();
                for sample in &samples {
                    let start = Instant::now();
                    let _ = self.registry.type_of(&sample.name);
                    self.search_mus += start.elapsed().as_micros() as u64;

                    match self.registry.apply(sample, now) {
                        Ok(()) => self.metrics_rx += 1,
                        Err(Error::TypeConflict { name, expected, found }) => {
                            warn!(
                                "metric {} already exists with type {:?}, got {:?}",
                                name, expected, found
                            );
                        }
                        Err(e) => warn!("ingest error: {}", e),
                    }
                }
                true
            }
            Command::Flush { reply } => {
                let records = self.registry.flush();
                let _ = reply.send(records);
                true
            }
            Command::HttpList { kind, reply } => {
                let names = match kind {
                    MetricType::Counter => self.registry.counter_names(),
                    MetricType::Gauge => self.registry.gauge_names(),
                    MetricType::Timer => self.registry.timer_names(),
                    MetricType::Set => self.registry.set_names(),
                };
                let _ = reply.send(names.into_iter().cloned().collect());
                true
            }
            Command::HttpGet { kind, name, reply } => {
                let view = match kind {
                    MetricType::Counter => self.registry.counter(&name).map(|c| CellView::Scalar {
                        value: c.value,
                        last_modified: c.last_modified,
                    }),
                    MetricType::Gauge => self.registry.gauge(&name).map(|c| CellView::Scalar {
                        value: c.value,
                        last_modified: c.last_modified,
                    }),
                    MetricType::Timer => self.registry.timer(&name).map(|c| {
                        let mut values = Vec::with_capacity(c.count as usize);
                        for (v, mult) in c.readings.iter() {
                            for _ in 0..*mult {
                                values.push(v.into_inner());
                            }
                        }
                        CellView::Timer {
                            values,
                            last_modified: c.last_modified,
                        }
                    }),
                    MetricType::Set => self.registry.set(&name).map(|c| CellView::Set {
                        values: c.values.iter().cloned().collect(),
                        last_modified: c.last_modified,
                    }),
                };
                let _ = reply.send(view);
                true
            }
            Command::HttpDelete { kind, name, reply } => {
                let existed = self.registry.delete(kind, &name);
                let _ = reply.send(existed);
                true
            }
            Command::SelfTelemetry { reply } => {
                let snapshot = TelemetrySnapshot {
                    bytes_rx: self.bytes_rx,
                    packets_rx: self.packets_rx,
                    metrics_rx: self.metrics_rx,
                    search_mus: self.search_mus,
                    cardinalities: self.registry.cardinalities(),
                };
                let _ = reply.send(snapshot);
                true
            }
            Command::Shutdown => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn ingest_then_flush_round_trip() {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || Aggregator::new().run(rx));

        let samples = vec![Sample {
            name: "gorets".to_string(),
            value: 1.0,
            raw_value: "1".to_string(),
            kind: MetricType::Counter,
            rate: None,
        }];
        tx.send(Command::Ingest { samples, len: 10 }).unwrap();

        let (reply_tx, reply_rx) = mpsc::channel();
        tx.send(Command::Flush { reply: reply_tx }).unwrap();
        let records = reply_rx.recv().unwrap();
        assert_eq!(records, vec![("gorets".to_string(), 1.0)]);

        tx.send(Command::Shutdown).unwrap();
        handle.join().unwrap();
    }
}
