//! Wire protocol parsers used by the sources to do their work.

pub mod statsd;
