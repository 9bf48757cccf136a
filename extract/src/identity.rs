use std::collections::HashMap;

use extract_mysql::types::IndexColumn;
use tracing::debug;

use crate::bail;
use crate::database::SourceDatabase;
use crate::error::{ErrorKind, ExtractResult};
use crate::types::{IdentityColumnSet, TableName};

/// Picks the columns identifying a row from `SHOW INDEXES` output.
///
/// The primary key wins. Without one, the first unique index listed whose key parts are all
/// plain columns is used. Columns are returned in `Seq_in_index` order.
pub fn identity_columns_from_indexes(indexes: &[IndexColumn]) -> Option<IdentityColumnSet> {
    let primary: Vec<&IndexColumn> = indexes.iter().filter(|index| index.is_primary()).collect();
    if !primary.is_empty() {
        return key_columns(primary);
    }

    let mut seen_keys: Vec<&str> = Vec::new();
    for index in indexes.iter().filter(|index| !index.non_unique) {
        if seen_keys.contains(&index.key_name.as_str()) {
            continue;
        }
        seen_keys.push(&index.key_name);

        let parts = indexes
            .iter()
            .filter(|candidate| candidate.key_name == index.key_name)
            .collect();
        if let Some(columns) = key_columns(parts) {
            return Some(columns);
        }
    }

    None
}

/// Orders the parts of one key, failing if any part is not a plain column.
fn key_columns(mut parts: Vec<&IndexColumn>) -> Option<IdentityColumnSet> {
    parts.sort_by_key(|part| part.seq_in_index);

    let columns = parts
        .into_iter()
        .map(|part| part.column_name.clone())
        .collect::<Option<Vec<_>>>()?;

    IdentityColumnSet::new(columns)
}

/// Resolves and caches the identity columns of source tables.
///
/// Only successful resolutions are cached: a table that failed stays unresolved and is queried
/// again the next time it is referenced.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    cache: HashMap<TableName, IdentityColumnSet>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity columns of `table`.
    ///
    /// Fails with [`ErrorKind::MissingIdentityColumns`] when the table has neither a primary key
    /// nor a usable unique index.
    pub async fn resolve<S>(
        &mut self,
        source: &S,
        table: &TableName,
    ) -> ExtractResult<IdentityColumnSet>
    where
        S: SourceDatabase,
    {
        if let Some(columns) = self.cache.get(table) {
            return Ok(columns.clone());
        }

        let indexes = source.index_columns(table).await?;
        let Some(columns) = identity_columns_from_indexes(&indexes) else {
            bail!(
                ErrorKind::MissingIdentityColumns,
                "Table has no primary key or unique index",
                table
            );
        };

        debug!(%table, columns = ?columns.columns(), "resolved identity columns");
        self.cache.insert(table.clone(), columns.clone());

        Ok(columns)
    }

    /// Returns the number of tables resolved so far.
    pub fn cached_tables(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryDatabase;

    fn columns(set: Option<IdentityColumnSet>) -> Option<Vec<String>> {
        set.map(|set| set.columns().to_vec())
    }

    #[test]
    fn primary_key_wins_over_unique_indexes() {
        let indexes = vec![
            IndexColumn::new("email_unique", false, 1, Some("email")),
            IndexColumn::new("PRIMARY", false, 2, Some("id")),
            IndexColumn::new("PRIMARY", false, 1, Some("tenant_id")),
        ];

        assert_eq!(
            columns(identity_columns_from_indexes(&indexes)),
            Some(vec!["tenant_id".to_owned(), "id".to_owned()])
        );
    }

    #[test]
    fn first_unique_index_is_used_without_primary_key() {
        let indexes = vec![
            IndexColumn::new("name_idx", true, 1, Some("name")),
            IndexColumn::new("email_unique", false, 1, Some("email")),
            IndexColumn::new("code_unique", false, 1, Some("code")),
        ];

        assert_eq!(
            columns(identity_columns_from_indexes(&indexes)),
            Some(vec!["email".to_owned()])
        );
    }

    #[test]
    fn functional_key_parts_are_skipped() {
        let indexes = vec![
            IndexColumn::new("lower_email", false, 1, None),
            IndexColumn::new("code_unique", false, 1, Some("code")),
        ];

        assert_eq!(
            columns(identity_columns_from_indexes(&indexes)),
            Some(vec!["code".to_owned()])
        );
    }

    #[test]
    fn tables_without_keys_have_no_identity() {
        let indexes = vec![IndexColumn::new("name_idx", true, 1, Some("name"))];

        assert_eq!(identity_columns_from_indexes(&indexes), None);
        assert_eq!(identity_columns_from_indexes(&[]), None);
    }

    #[tokio::test]
    async fn successful_resolutions_are_cached() {
        let source = MemoryDatabase::new();
        let users = TableName::new("shop", "users");
        let logs = TableName::new("shop", "logs");
        source
            .create_table(
                users.clone(),
                vec![IndexColumn::new("PRIMARY", false, 1, Some("id"))],
            )
            .await;
        source.create_table(logs.clone(), vec![]).await;

        let mut resolver = IdentityResolver::new();
        for _ in 0..2 {
            let columns = resolver.resolve(&source, &users).await.unwrap();
            assert_eq!(columns.columns(), ["id".to_owned()]);

            let err = resolver.resolve(&source, &logs).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingIdentityColumns);
        }

        assert_eq!(resolver.cached_tables(), 1);
        assert_eq!(
            source.statements().await,
            vec![
                "SHOW INDEXES FROM `shop`.`users`",
                "SHOW INDEXES FROM `shop`.`logs`",
                "SHOW INDEXES FROM `shop`.`logs`",
            ]
        );
    }
}
