use extract_config::shared::{IntoConnectOptions, MySqlConnectionConfig};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use thiserror::Error;
use tracing::debug;

use crate::codec::decode_row;
use crate::types::{IndexColumn, TableName};

/// Errors raised while reading index metadata.
#[derive(Debug, Error)]
pub enum IndexMetadataError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unexpected `SHOW INDEXES` row for table {0}")]
    InvalidRow(TableName),
}

/// Creates a connection pool that opens its first connection on first use.
pub fn connect_lazy(config: &MySqlConnectionConfig) -> MySqlPool {
    MySqlPoolOptions::new()
        .min_connections(0)
        .max_connections(config.max_connections)
        .connect_lazy_with(config.with_db())
}

/// Returns the statement listing the indexes of `table`.
pub fn show_indexes_query(table: &TableName) -> String {
    format!("SHOW INDEXES FROM {}", table.as_quoted_identifier())
}

/// Lists the index columns of `table` in the order the server reports them.
///
/// The server lists the primary key first, followed by the remaining indexes, each with its
/// columns in `Seq_in_index` order.
pub async fn get_index_columns(
    pool: &MySqlPool,
    table: &TableName,
) -> Result<Vec<IndexColumn>, IndexMetadataError> {
    let query = show_indexes_query(table);
    let rows = sqlx::query(&query).fetch_all(pool).await?;

    debug!(%table, indexes = rows.len(), "loaded index metadata");

    rows.iter()
        .map(|row| {
            let row = decode_row(row)?;
            IndexColumn::from_show_indexes_row(&row)
                .ok_or_else(|| IndexMetadataError::InvalidRow(table.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_indexes_quotes_the_table() {
        assert_eq!(
            show_indexes_query(&TableName::new("shop", "order`items")),
            "SHOW INDEXES FROM `shop`.`order``items`"
        );
    }
}
