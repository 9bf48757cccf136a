//! Telemetry setup shared by the extractor binary and its tests.

pub mod metrics;
pub mod tracing;
