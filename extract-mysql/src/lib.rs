//! MySQL building blocks for the row extractor.
//!
//! Provides the value model ([`types::Cell`], [`types::TableRow`]), identifier quoting, row
//! decoding and parameter binding for [`sqlx`], and the index metadata query used to find the
//! identifying columns of a table.

pub mod codec;
pub mod db;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod types;
