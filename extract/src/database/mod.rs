//! Access to the source and destination servers.
//!
//! The pipeline only talks to databases through [`SourceDatabase`] and [`DestinationDatabase`].
//! [`mysql`] implements both over `sqlx` pools, [`memory`] keeps tables in memory for tests.

use std::future::Future;

use extract_mysql::types::{IndexColumn, TableName, TableRow, quote_identifier};

use crate::error::ExtractResult;

pub mod memory;
pub mod mysql;

/// Read access to the server the logged queries are replayed against.
pub trait SourceDatabase {
    /// Lists the index columns of `table` in the order the server reports them.
    fn index_columns(
        &self,
        table: &TableName,
    ) -> impl Future<Output = ExtractResult<Vec<IndexColumn>>> + Send;

    /// Executes a SELECT statement and returns every result row.
    fn fetch_rows(&self, sql: &str) -> impl Future<Output = ExtractResult<Vec<TableRow>>> + Send;

    /// Returns at most `limit` full rows of `table` whose columns match `identity`.
    ///
    /// Values are compared with null-safe equality, so a `NULL` identity value matches `NULL`.
    fn fetch_identified_rows(
        &self,
        table: &TableName,
        identity: &TableRow,
        limit: u32,
    ) -> impl Future<Output = ExtractResult<Vec<TableRow>>> + Send;
}

/// Write access to the server receiving the located rows.
pub trait DestinationDatabase {
    /// Inserts `row` into `table` unless a row with the same key already exists.
    ///
    /// Returns the number of inserted rows, `0` when the row was ignored.
    fn insert_ignore(
        &self,
        table: &TableName,
        row: &TableRow,
    ) -> impl Future<Output = ExtractResult<u64>> + Send;
}

/// Builds the statement fetching full rows of `table` by identity columns.
///
/// Every column is compared with `<=>` against a positional parameter.
pub fn select_by_identity_query<'a>(
    table: &TableName,
    columns: impl IntoIterator<Item = &'a str>,
    limit: u32,
) -> String {
    let predicate = columns
        .into_iter()
        .map(|column| format!("{} <=> ?", quote_identifier(column)))
        .collect::<Vec<_>>()
        .join(" AND ");

    format!(
        "SELECT * FROM {} WHERE {predicate} LIMIT {limit}",
        table.as_quoted_identifier()
    )
}

/// Builds the statement inserting one row into `table`, ignoring key conflicts.
pub fn insert_ignore_query<'a>(
    table: &TableName,
    columns: impl IntoIterator<Item = &'a str>,
) -> String {
    let columns: Vec<String> = columns.into_iter().map(quote_identifier).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");

    format!(
        "INSERT IGNORE INTO {} ({}) VALUES ({placeholders})",
        table.as_quoted_identifier(),
        columns.join(", ")
    )
}
