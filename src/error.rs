//! Error taxonomy for the daemon.
//!
//! Parse and ingest errors are always local: they are logged and the
//! offending sample or datagram is discarded, never propagated as a
//! `Result::Err` that unwinds anything. Only startup errors
//! (`BindFailure` when no address binds, `FatalInit`) cause the
//! process to exit non-zero.

use std::io;

use metric::MetricType;

/// The daemon's single error currency.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed datagram or sample.
    #[error("parse error: {0}")]
    Parse(String),

    /// A sample's type disagreed with its cell's existing type.
    #[error("type conflict for {name}: expected {expected:?}, got {found:?}")]
    TypeConflict {
        /// The metric name in conflict.
        name: String,
        /// The cell's existing type.
        expected: MetricType,
        /// The sample's type.
        found: MetricType,
    },

    /// The outbound sink was not CONNECTED at flush time.
    #[error("sink disconnected")]
    SinkDisconnected,

    /// A listen address could not be bound at startup.
    #[error("failed to bind {addr}: {source}")]
    BindFailure {
        /// The address that failed to bind.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Configuration, event loop, HTTP bind, or sink-library init failure.
    #[error("fatal initialization failure: {0}")]
    FatalInit(String),
}
