//! Helpers shared by unit and integration tests.
//!
//! [`fixtures`] builds in-memory scenarios. [`database`] creates throwaway databases on a live
//! MySQL server and needs the `test-utils` feature.

#[cfg(feature = "test-utils")]
pub mod database;
pub mod fixtures;
