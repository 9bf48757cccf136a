//! Coordination primitives for extraction runs.

pub mod shutdown;
