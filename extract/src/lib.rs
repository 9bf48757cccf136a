//! Query-driven row extraction between MySQL servers.
//!
//! A log of SELECT statements is replayed against a source server. Every statement is
//! augmented with the identity columns of the tables it reads, so that running it once yields
//! the keys of every row that contributed to its result. Those rows are then copied into a
//! destination server with `INSERT IGNORE`.
//!
//! The entry point is [`pipeline::Pipeline`], which works against the [`database::SourceDatabase`]
//! and [`database::DestinationDatabase`] traits. MySQL implementations live in
//! [`database::mysql`] and an in-memory one in [`database::memory`].

pub mod concurrency;
pub mod database;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod identity;
pub mod locator;
pub mod log;
mod macros;
pub mod metrics;
pub mod pipeline;
pub mod replication;
pub mod statement;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
