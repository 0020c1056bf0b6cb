//! tallyd is a statsd-compatible metrics aggregation daemon. It
//! ingests line-oriented metric submissions over UDP, aggregates them
//! in memory by name and type, periodically flushes the aggregates to
//! a Graphite-compatible line-protocol sink, and exposes a minimal
//! HTTP surface for introspecting and retiring individual metrics. A
//! second, independent sink connection carries the daemon's own
//! health and throughput telemetry.
//!
//! tallyd favors a minimal CPU/memory footprint and bursty-ingest
//! tolerance without load-shedding, scoped to a single aggregation
//! pipeline: one ingest protocol, one primary sink, one self-telemetry
//! sink, no filter or routing stage.
#![allow(unknown_lints)]
#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

extern crate chrono;
extern crate clap;
extern crate libc;
extern crate mio;
extern crate ordered_float;
extern crate tiny_http;
extern crate toml;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

extern crate serde;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;

extern crate thiserror;

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod aggregator;
pub mod config;
pub mod constants;
pub mod error;
pub mod flush;
pub mod http;
pub mod metric;
pub mod protocols;
pub mod registry;
pub mod sink;
pub mod source;
pub mod telemetry;
pub mod thread;
pub mod time;
