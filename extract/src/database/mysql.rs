use std::borrow::Cow;

use extract_config::shared::MySqlConnectionConfig;
use extract_mysql::codec::{bind_cells, decode_row};
use extract_mysql::db::{connect_lazy, get_index_columns};
use extract_mysql::types::{Cell, IndexColumn, TableName, TableRow, format_params};
use sqlx::MySqlPool;
use tracing::debug;

use crate::database::{
    DestinationDatabase, SourceDatabase, insert_ignore_query, select_by_identity_query,
};
use crate::error::{ErrorKind, ExtractError, ExtractResult};

/// Which server a statement was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Source,
    Destination,
}

/// Builds an error for a failed statement, keeping the SQL and its parameters in the detail.
fn query_error(side: Side, err: sqlx::Error, sql: &str, params: &[Cell]) -> ExtractError {
    let kind = match (&err, side) {
        (
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut,
            Side::Source,
        ) => ErrorKind::SourceConnectionFailed,
        (
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut,
            Side::Destination,
        ) => ErrorKind::DestinationConnectionFailed,
        (
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::Encode(_),
            _,
        ) => ErrorKind::ConversionError,
        (_, Side::Source) => ErrorKind::SourceQueryFailed,
        (_, Side::Destination) => ErrorKind::DestinationQueryFailed,
    };

    let description = match side {
        Side::Source => "Statement against the source failed",
        Side::Destination => "Statement against the destination failed",
    };

    let detail = format!("{err}\nSQL: {sql}\nParams: {}", format_params(params));
    ExtractError::from((kind, description, Cow::Owned(detail))).with_source(err)
}

/// Source server reached through a lazily connected `sqlx` pool.
#[derive(Debug, Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    /// Creates a source whose first connection is opened on first use.
    pub fn connect_lazy(config: &MySqlConnectionConfig) -> Self {
        Self {
            pool: connect_lazy(config),
        }
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl SourceDatabase for MySqlSource {
    async fn index_columns(&self, table: &TableName) -> ExtractResult<Vec<IndexColumn>> {
        let columns = get_index_columns(&self.pool, table).await?;

        Ok(columns)
    }

    async fn fetch_rows(&self, sql: &str) -> ExtractResult<Vec<TableRow>> {
        debug!(sql, "executing statement against source");

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| query_error(Side::Source, err, sql, &[]))?;

        rows.iter()
            .map(|row| decode_row(row).map_err(|err| query_error(Side::Source, err, sql, &[])))
            .collect()
    }

    async fn fetch_identified_rows(
        &self,
        table: &TableName,
        identity: &TableRow,
        limit: u32,
    ) -> ExtractResult<Vec<TableRow>> {
        let sql = select_by_identity_query(
            table,
            identity.columns().iter().map(String::as_str),
            limit,
        );
        let params = identity.values();

        let rows = bind_cells(sqlx::query(&sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| query_error(Side::Source, err, &sql, params))?;

        rows.iter()
            .map(|row| decode_row(row).map_err(|err| query_error(Side::Source, err, &sql, params)))
            .collect()
    }
}

/// Destination server reached through a lazily connected `sqlx` pool.
#[derive(Debug, Clone)]
pub struct MySqlDestination {
    pool: MySqlPool,
}

impl MySqlDestination {
    /// Creates a destination whose first connection is opened on first use.
    pub fn connect_lazy(config: &MySqlConnectionConfig) -> Self {
        Self {
            pool: connect_lazy(config),
        }
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl DestinationDatabase for MySqlDestination {
    async fn insert_ignore(&self, table: &TableName, row: &TableRow) -> ExtractResult<u64> {
        let sql = insert_ignore_query(table, row.columns().iter().map(String::as_str));
        let params = row.values();

        let result = bind_cells(sqlx::query(&sql), params)
            .execute(&self.pool)
            .await
            .map_err(|err| query_error(Side::Destination, err, &sql, params))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_keep_sql_and_params() {
        let err = query_error(
            Side::Destination,
            sqlx::Error::RowNotFound,
            "INSERT IGNORE INTO `a`.`b` (`id`) VALUES (?)",
            &[Cell::I64(5)],
        );

        assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
        assert_eq!(
            err.detail(),
            Some(
                "no rows returned by a query that expected to return at least one row\n\
                 SQL: INSERT IGNORE INTO `a`.`b` (`id`) VALUES (?)\n\
                 Params: [5]"
            )
        );
    }

    #[test]
    fn connection_failures_are_attributed_to_their_side() {
        let err = query_error(Side::Source, sqlx::Error::PoolTimedOut, "SELECT 1", &[]);
        assert_eq!(err.kind(), ErrorKind::SourceConnectionFailed);

        let err = query_error(Side::Destination, sqlx::Error::PoolClosed, "SELECT 1", &[]);
        assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);
    }
}
