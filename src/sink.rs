//! The Graphite line-protocol sink client: a persistent TCP
//! connection with a timed, non-blocking reconnect.
//!
//! An explicit state machine rather than an `Option<TcpStream>` plus
//! a `delivery_failure` flag, so the DISCONNECTED/CONNECTING/
//! CONNECTED transitions are visible in the type instead of inferred
//! from two fields.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};

use error::Error;
use time;

/// Byte ceiling for a single flush tick's outbound buffer. Records
/// beyond this ceiling for the current tick are dropped, not
/// reordered.
pub const SINK_BUFFER_LIMIT: usize = 1024 * 1024;

/// Connection lifecycle of the outbound sink.
pub enum SinkState {
    /// No connection attempt outstanding; a reconnect is scheduled for
    /// `retry_at` (epoch seconds).
    Disconnected {
        /// When to attempt the next connect.
        retry_at: i64,
        /// Consecutive failed attempts, used to back off `retry_at`.
        attempts: u32,
    },
    /// A connection attempt is about to be made synchronously; this
    /// state exists only for the duration of `Sink::tick`'s own call
    /// to `connect`, and is never observed between calls.
    Connecting,
    /// A live connection is held open.
    Connected(TcpStream),
}

/// A named outbound sink: host/port, reconnect interval, and current
/// connection state, plus the two counters the self-telemetry sampler
/// reads (`graphite.bytes.tx` / `graphite.metrics.tx`).
pub struct Sink {
    host: String,
    port: u16,
    reconnect_interval: i64,
    state: SinkState,
    /// Cumulative bytes successfully enqueued to the outbound buffer.
    pub bytes_tx: u64,
    /// Cumulative records successfully enqueued to the outbound buffer.
    pub records_tx: u64,
}

impl Sink {
    /// Build a sink in the DISCONNECTED state, due for its first
    /// connect attempt immediately.
    pub fn new(host: String, port: u16, reconnect_interval: i64) -> Sink {
        Sink {
            host,
            port,
            reconnect_interval,
            state: SinkState::Disconnected {
                retry_at: time::now(),
                attempts: 0,
            },
            bytes_tx: 0,
            records_tx: 0,
        }
    }

    /// True if the sink currently holds a live connection.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SinkState::Connected(_))
    }

    fn connect(&mut self) -> Option<TcpStream> {
        let addrs = (self.host.as_str(), self.port).to_socket_addrs();
        match addrs {
            Ok(resolved) => {
                for addr in resolved {
                    match TcpStream::connect(addr) {
                        Ok(stream) => return Some(stream),
                        Err(e) => {
                            info!(
                                "unable to connect to sink at {} ({}): {}",
                                self.host, addr, e
                            );
                        }
                    }
                }
                None
            }
            Err(e) => {
                info!("DNS lookup failed for sink host {}: {}", self.host, e);
                None
            }
        }
    }

    /// Ensure we have (or attempt to acquire) a live connection for
    /// this tick, respecting the reconnect backoff schedule.
    fn ensure_connected(&mut self, now: i64) {
        if let SinkState::Disconnected { retry_at, attempts } = self.state {
            if now < retry_at {
                return;
            }
            self.state = SinkState::Connecting;
            match self.connect() {
                Some(stream) => self.state = SinkState::Connected(stream),
                None => {
                    self.state = SinkState::Disconnected {
                        retry_at: now + self.reconnect_interval,
                        attempts: attempts.saturating_add(1),
                    };
                }
            }
        }
    }

    /// Write one flush tick's worth of pre-rendered lines to the sink.
    ///
    /// Lines already carry the metric name, value, and timestamp;
    /// `prefix` (possibly empty) is prepended to each. If the sink is
    /// not CONNECTED, all lines for this tick are dropped; the caller
    /// resets accumulator state regardless, since that reset doesn't
    /// depend on this function's success. If the buffer would exceed
    /// `SINK_BUFFER_LIMIT`, trailing lines for this tick are dropped
    /// without reordering what's already been written.
    pub fn write_tick(&mut self, prefix: &str, records: &[(String, f64)], now: i64) {
        self.ensure_connected(now);

        let stream = match &mut self.state {
            SinkState::Connected(stream) => stream,
            _ => {
                if !records.is_empty() {
                    warn!("{}: dropping {} record(s) for this tick", Error::SinkDisconnected, records.len());
                }
                return;
            }
        };

        let mut buf = String::with_capacity(8192);
        let mut written = 0usize;
        for (name, value) in records {
            let line = if prefix.is_empty() {
                format!("{} {} {}\n", name, format_value(*value), now)
            } else {
                format!("{}.{} {} {}\n", prefix, name, format_value(*value), now)
            };
            if buf.len() + line.len() > SINK_BUFFER_LIMIT {
                warn!("sink buffer limit reached, dropping remaining records this tick");
                break;
            }
            buf.push_str(&line);
            written += 1;
        }

        match stream.write_all(buf.as_bytes()) {
            Ok(()) => {
                self.bytes_tx += buf.len() as u64;
                self.records_tx += written as u64;
            }
            Err(e) => {
                warn!("sink write failed, disconnecting: {}", e);
                self.state = SinkState::Disconnected {
                    retry_at: now + self.reconnect_interval,
                    attempts: 1,
                };
            }
        }
    }
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let sink = Sink::new("127.0.0.1".to_string(), 1972, 5);
        assert!(!sink.is_connected());
    }

    #[test]
    fn format_value_integral_vs_fractional() {
        assert_eq!(format_value(1.0), "1");
        assert_eq!(format_value(246.666_666_7).starts_with("246.6"), true);
    }
}
