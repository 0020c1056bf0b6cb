//! Ingest sources. Only the statsd UDP listener is in scope.

pub mod statsd;
