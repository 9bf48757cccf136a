use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use extract_mysql::types::{IndexColumn, TableName, TableRow};
use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::database::{
    DestinationDatabase, SourceDatabase, insert_ignore_query, select_by_identity_query,
};
use crate::error::{ErrorKind, ExtractResult};

#[derive(Debug, Default)]
struct MemoryTable {
    indexes: Vec<IndexColumn>,
    rows: Vec<TableRow>,
}

impl MemoryTable {
    /// Returns the column lists of every unique index, primary key included.
    fn unique_keys(&self) -> Vec<Vec<&str>> {
        let mut keys: BTreeMap<&str, Vec<(u32, &str)>> = BTreeMap::new();
        for index in self.indexes.iter().filter(|index| !index.non_unique) {
            if let Some(column) = index.column_name.as_deref() {
                keys.entry(index.key_name.as_str())
                    .or_default()
                    .push((index.seq_in_index, column));
            }
        }

        keys.into_values()
            .map(|mut columns| {
                columns.sort_by_key(|(seq, _)| *seq);
                columns.into_iter().map(|(_, column)| column).collect()
            })
            .collect()
    }

    fn conflicts_with(&self, row: &TableRow) -> bool {
        let keys = self.unique_keys();
        self.rows.iter().any(|existing| {
            keys.iter().any(|key| {
                key.iter().all(|column| {
                    existing
                        .get(column)
                        .is_some_and(|value| !value.is_null() && row.get(column) == Some(value))
                })
            })
        })
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TableName, MemoryTable>,
    query_results: VecDeque<Vec<TableRow>>,
    statements: Vec<String>,
}

/// In-memory database usable as source and destination in tests.
///
/// Tables hold rows and index metadata, and behave like MySQL for the operations the pipeline
/// needs. Arbitrary SELECT statements cannot be evaluated: [`SourceDatabase::fetch_rows`] returns
/// the results queued with [`MemoryDatabase::push_query_result`], in order. Every statement is
/// recorded and can be inspected with [`MemoryDatabase::statements`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `table` with the given index metadata, replacing any previous table.
    pub async fn create_table(&self, table: TableName, indexes: Vec<IndexColumn>) {
        let mut inner = self.inner.lock().await;
        inner.tables.insert(
            table,
            MemoryTable {
                indexes,
                rows: Vec::new(),
            },
        );
    }

    /// Appends `rows` to `table` without any key check.
    ///
    /// # Panics
    ///
    /// Panics if the table was not created.
    pub async fn insert_rows(&self, table: &TableName, rows: Vec<TableRow>) {
        let mut inner = self.inner.lock().await;
        inner
            .tables
            .get_mut(table)
            .unwrap_or_else(|| panic!("table {table} must be created before inserting rows"))
            .rows
            .extend(rows);
    }

    /// Queues the result of the next [`SourceDatabase::fetch_rows`] call.
    pub async fn push_query_result(&self, rows: Vec<TableRow>) {
        let mut inner = self.inner.lock().await;
        inner.query_results.push_back(rows);
    }

    /// Returns a copy of the rows of `table`, empty if it does not exist.
    pub async fn table_rows(&self, table: &TableName) -> Vec<TableRow> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(table)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    /// Returns every statement executed so far, in order.
    pub async fn statements(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.statements.clone()
    }
}

impl SourceDatabase for MemoryDatabase {
    async fn index_columns(&self, table: &TableName) -> ExtractResult<Vec<IndexColumn>> {
        let mut inner = self.inner.lock().await;
        inner
            .statements
            .push(extract_mysql::db::show_indexes_query(table));

        match inner.tables.get(table) {
            Some(table) => Ok(table.indexes.clone()),
            None => bail!(
                ErrorKind::SourceQueryFailed,
                "Statement against the source failed",
                format!("Table '{table}' doesn't exist")
            ),
        }
    }

    async fn fetch_rows(&self, sql: &str) -> ExtractResult<Vec<TableRow>> {
        let mut inner = self.inner.lock().await;
        inner.statements.push(sql.to_owned());

        match inner.query_results.pop_front() {
            Some(rows) => Ok(rows),
            None => bail!(
                ErrorKind::SourceQueryFailed,
                "Statement against the source failed",
                format!("No result queued for: {sql}")
            ),
        }
    }

    async fn fetch_identified_rows(
        &self,
        table: &TableName,
        identity: &TableRow,
        limit: u32,
    ) -> ExtractResult<Vec<TableRow>> {
        let mut inner = self.inner.lock().await;
        inner.statements.push(select_by_identity_query(
            table,
            identity.columns().iter().map(String::as_str),
            limit,
        ));

        let Some(stored) = inner.tables.get(table) else {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Statement against the source failed",
                format!("Table '{table}' doesn't exist")
            );
        };

        let rows = stored
            .rows
            .iter()
            .filter(|row| {
                identity
                    .iter()
                    .all(|(column, value)| row.get(column) == Some(value))
            })
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(rows)
    }
}

impl DestinationDatabase for MemoryDatabase {
    async fn insert_ignore(&self, table: &TableName, row: &TableRow) -> ExtractResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.statements.push(insert_ignore_query(
            table,
            row.columns().iter().map(String::as_str),
        ));

        let Some(stored) = inner.tables.get_mut(table) else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Statement against the destination failed",
                format!("Table '{table}' doesn't exist")
            );
        };

        if stored.conflicts_with(row) {
            info!(%table, "ignoring row with an existing key");
            return Ok(0);
        }

        stored.rows.push(row.clone());

        Ok(1)
    }
}
