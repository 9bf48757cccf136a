//! Copies located rows from the source into the destination.

use std::collections::HashMap;

use extract_mysql::types::Cell;
use tracing::{debug, warn};

use crate::bail;
use crate::database::{DestinationDatabase, SourceDatabase};
use crate::error::{ErrorKind, ExtractResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{REPLICATE_ROW__BEFORE_INSERT, extract_fail_point};
use crate::types::IdentityTupleGroup;

/// Rows fetched per identity tuple. Two are enough to notice an identity matching several rows.
const IDENTIFIED_ROWS_LIMIT: u32 = 2;

/// Maps source databases to the destination databases receiving their rows.
#[derive(Debug, Clone, Default)]
pub struct DatabaseMapping {
    entries: HashMap<String, String>,
    same_server: bool,
}

impl DatabaseMapping {
    /// Creates a mapping. `same_server` tells whether source and destination are one server.
    pub fn new(entries: HashMap<String, String>, same_server: bool) -> Self {
        Self {
            entries,
            same_server,
        }
    }

    /// Returns whether source and destination are the same server.
    pub fn same_server(&self) -> bool {
        self.same_server
    }

    /// Returns the destination database for rows of `source_database`.
    ///
    /// Unmapped databases keep their name, which fails with [`ErrorKind::SameServer`] when source
    /// and destination are the same server: the rows would be written over themselves.
    pub fn destination_database<'a>(&'a self, source_database: &'a str) -> ExtractResult<&'a str> {
        if let Some(destination) = self.entries.get(source_database) {
            return Ok(destination.as_str());
        }

        if self.same_server {
            bail!(
                ErrorKind::SameServer,
                "Unmapped database would be replicated into itself",
                source_database
            );
        }

        Ok(source_database)
    }
}

/// What happened to one identity tuple group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationOutcome {
    /// The row was written to the destination.
    Inserted,
    /// The destination already held a row with the same key.
    AlreadyPresent,
    /// The source no longer holds the row.
    SourceRowMissing,
    /// Every identity value is NULL: an outer join found no row of this table.
    NoContributingRow,
    /// The identity matched several source rows, so the row read by the query is unknown.
    AmbiguousIdentity,
}

/// Copies the row identified by `group` from `source` to `destination`.
///
/// The destination database is resolved before anything is read, so a refused replication
/// performs no statement at all. Rows are inserted with `INSERT IGNORE`: the first copy of a row
/// wins and later copies leave it untouched.
///
/// A group whose identity values are all NULL is not looked up. A lookup matching more than one
/// row, which a partially NULL composite key allows, copies nothing.
pub async fn replicate<S, D>(
    source: &S,
    destination: &D,
    mapping: &DatabaseMapping,
    group: &IdentityTupleGroup,
) -> ExtractResult<ReplicationOutcome>
where
    S: SourceDatabase,
    D: DestinationDatabase,
{
    let source_table = group.table.table_name();
    let destination_table =
        source_table.in_database(mapping.destination_database(&source_table.database)?);

    if group.identity.is_empty() {
        bail!(
            ErrorKind::InvalidState,
            "Identity tuple group has no columns",
            source_table
        );
    }

    if group.identity.values().iter().all(Cell::is_null) {
        debug!(table = %source_table, "no row of the table contributed to the result row");
        return Ok(ReplicationOutcome::NoContributingRow);
    }

    let mut rows = source
        .fetch_identified_rows(&source_table, &group.identity, IDENTIFIED_ROWS_LIMIT)
        .await?;

    if rows.len() > 1 {
        warn!(
            table = %source_table,
            identity = ?group.identity,
            "identity columns matched more than one row, skipping"
        );
        return Ok(ReplicationOutcome::AmbiguousIdentity);
    }

    let Some(row) = rows.pop() else {
        debug!(table = %source_table, "row vanished from the source");
        return Ok(ReplicationOutcome::SourceRowMissing);
    };

    #[cfg(feature = "failpoints")]
    extract_fail_point(REPLICATE_ROW__BEFORE_INSERT)?;

    let inserted = destination.insert_ignore(&destination_table, &row).await?;
    if inserted == 0 {
        return Ok(ReplicationOutcome::AlreadyPresent);
    }

    Ok(ReplicationOutcome::Inserted)
}
