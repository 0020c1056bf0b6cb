//! The flush scheduler and self-telemetry ticker, driven from one
//! thread that owns both outbound `Sink`s.
//!
//! Both sinks are owned here, not shared, so there is no
//! synchronization to reason about: the primary sink is written on
//! its own interval, the self-telemetry sink on its own, and the two
//! counters the self-telemetry record needs
//! (`graphite.bytes.tx`/`graphite.metrics.tx`) are read directly off
//! the primary `Sink` value this thread already holds.

use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use aggregator::Command;
use sink::Sink;
use telemetry;
use time;

/// Configuration for the combined flush/self-telemetry driver.
pub struct FlushConfig {
    /// Primary sink host.
    pub primary_host: String,
    /// Primary sink port.
    pub primary_port: u16,
    /// Primary sink reconnect interval, seconds.
    pub primary_reconnect_interval: i64,
    /// Primary flush interval, seconds.
    pub primary_flush_interval: u64,
    /// Global prefix prepended to every primary record's metric name.
    pub primary_prefix: String,

    /// Self-telemetry sink host.
    pub stats_host: String,
    /// Self-telemetry sink port.
    pub stats_port: u16,
    /// Self-telemetry sink reconnect interval, seconds.
    pub stats_reconnect_interval: i64,
    /// Self-telemetry flush interval, seconds.
    pub stats_flush_interval: u64,
    /// Prefix prepended to every self-telemetry record's metric name.
    pub stats_prefix: String,
}

/// Drive both sinks until the aggregator channel hangs up (shutdown).
///
/// Ticks at the coarser of the two configured intervals would miss
/// the finer one, so this loop wakes on a 1-second cadence and fires
/// each sink's tick only when its own interval has elapsed.
pub fn run(commands: Sender<Command>, config: FlushConfig) {
    let mut primary = Sink::new(
        config.primary_host,
        config.primary_port,
        config.primary_reconnect_interval,
    );
    let mut stats_sink = Sink::new(
        config.stats_host,
        config.stats_port,
        config.stats_reconnect_interval,
    );

    let mut last_primary_flush = time::now();
    let mut last_stats_flush = time::now();

    loop {
        thread::sleep(Duration::from_secs(1));
        let now = time::now();

        if now - last_primary_flush >= config.primary_flush_interval as i64 {
            last_primary_flush = now;
            let (reply_tx, reply_rx) = mpsc::channel();
            if commands
                .send(Command::Flush { reply: reply_tx })
                .is_err()
            {
                return;
            }
            if let Ok(records) = reply_rx.recv() {
                primary.write_tick(&config.primary_prefix, &records, now);
            }
        }

        if now - last_stats_flush >= config.stats_flush_interval as i64 {
            last_stats_flush = now;
            if stats_sink.is_connected() {
                let (reply_tx, reply_rx) = mpsc::channel();
                if commands
                    .send(Command::SelfTelemetry { reply: reply_tx })
                    .is_err()
                {
                    return;
                }
                if let Ok(snapshot) = reply_rx.recv() {
                    let records =
                        telemetry::render(&snapshot, primary.bytes_tx, primary.records_tx);
                    stats_sink.write_tick(&config.stats_prefix, &records, now);
                }
            } else {
                // still advance the connection state machine even when
                // there's nothing to send this tick.
                stats_sink.write_tick(&config.stats_prefix, &[], now);
            }
        }
    }
}
