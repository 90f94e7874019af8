//! Metrics store backends.

pub mod influx;

pub use influx::InfluxSink;
