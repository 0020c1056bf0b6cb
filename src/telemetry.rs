//! The self-telemetry metric set: a fixed twelve records drained into
//! the self-telemetry sink every tick, covering send throughput,
//! ingest throughput, and per-type cardinality.
//!
//! Buffer depth is reported as 0 unconditionally: the sink client
//! (`sink.rs`) writes each tick's records synchronously rather than
//! holding a persistent outbound queue across ticks, so there is no
//! standing buffer occupancy to sample beyond "0 while connected".

use aggregator::TelemetrySnapshot;

/// Render the fixed self-telemetry metric set for one tick.
///
/// `primary_bytes_tx`/`primary_records_tx` are the primary sink's
/// cumulative send-side counters at the moment of the tick.
pub fn render(
    snapshot: &TelemetrySnapshot,
    primary_bytes_tx: u64,
    primary_records_tx: u64,
) -> Vec<(String, f64)> {
    vec![
        ("graphite.bytes.tx".to_string(), primary_bytes_tx as f64),
        ("graphite.metrics.tx".to_string(), primary_records_tx as f64),
        ("graphite.buffer.input".to_string(), 0.0),
        ("graphite.buffer.output".to_string(), 0.0),
        ("bytes.rx".to_string(), snapshot.bytes_rx as f64),
        ("packets.rx".to_string(), snapshot.packets_rx as f64),
        ("metrics.rx".to_string(), snapshot.metrics_rx as f64),
        ("search.mus".to_string(), snapshot.search_mus as f64),
        ("counters".to_string(), snapshot.cardinalities[0] as f64),
        ("gauges".to_string(), snapshot.cardinalities[1] as f64),
        ("timers".to_string(), snapshot.cardinalities[2] as f64),
        ("sets".to_string(), snapshot.cardinalities[3] as f64),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_twelve_fixed_metrics() {
        let snapshot = TelemetrySnapshot::default();
        let records = render(&snapshot, 0, 0);
        assert_eq!(records.len(), 12);
        assert!(records.iter().any(|(name, _)| name == "search.mus"));
    }
}
