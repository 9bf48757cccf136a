//! Locates the source rows a SELECT statement reads.
//!
//! The statement is augmented with one synthetic output column per identity column of every
//! table occurrence in its FROM clause. Running it once yields, for each result row, the
//! identity values of every row that contributed to it.

use std::collections::HashSet;

use extract_mysql::types::quote_identifier;
use tracing::debug;

use crate::bail;
use crate::database::SourceDatabase;
use crate::error::{ErrorKind, ExtractResult};
use crate::identity::IdentityResolver;
use crate::statement::{ParsedStatement, append_output_columns, extract_tables, parse, render};
use crate::types::{IdentityAlias, IdentityTupleGroup, LocatedRows, TableReference, TableRow};

/// Prefix of the synthetic output columns, followed by `_<n>`.
pub const IDENTITY_ALIAS_PREFIX: &str = "__extract_id";

/// A statement extended with identity columns, ready to run against the source.
#[derive(Debug, Clone)]
pub struct AugmentedStatement {
    /// SQL to execute.
    pub sql: String,
    /// Table occurrences in FROM order.
    pub tables: Vec<TableReference>,
    /// Synthetic output columns in select-list order.
    pub aliases: Vec<IdentityAlias>,
}

/// Extends `statement` with the identity columns of every occurrence in `tables`.
///
/// Fails with [`ErrorKind::MissingIdentityColumns`] if any table cannot be keyed.
pub async fn augment<S>(
    source: &S,
    resolver: &mut IdentityResolver,
    statement: ParsedStatement,
    tables: Vec<TableReference>,
) -> ExtractResult<AugmentedStatement>
where
    S: SourceDatabase,
{
    let taken: HashSet<String> = statement.output_aliases().into_iter().collect();
    let mut counter = 0usize;
    let mut aliases = Vec::new();
    let mut fragment = Vec::new();

    for (occurrence, table) in tables.iter().enumerate() {
        let columns = resolver.resolve(source, &table.table_name()).await?;
        let qualifier = table.column_qualifier();

        for column in columns.iter() {
            let name = loop {
                let candidate = format!("{IDENTITY_ALIAS_PREFIX}_{counter}");
                counter += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };

            fragment.push(format!(
                "{qualifier}.{} AS {}",
                quote_identifier(column),
                quote_identifier(&name)
            ));
            aliases.push(IdentityAlias {
                name,
                occurrence,
                column: column.to_owned(),
            });
        }
    }

    if fragment.is_empty() {
        return Ok(AugmentedStatement {
            sql: render(&statement),
            tables,
            aliases,
        });
    }

    let statement = append_output_columns(statement, &fragment.join(", "))?;
    let sql = render(&statement);
    debug!(%sql, tables = tables.len(), "augmented statement");

    Ok(AugmentedStatement {
        sql,
        tables,
        aliases,
    })
}

/// Splits the result rows of an augmented statement into identity tuple groups.
///
/// Each row yields one group per table occurrence. Fails with [`ErrorKind::InvalidData`] if a
/// row lacks one of the synthetic columns.
pub fn decompose(augmented: &AugmentedStatement, rows: &[TableRow]) -> ExtractResult<LocatedRows> {
    let mut located = Vec::with_capacity(rows.len());

    for row in rows {
        let mut groups = Vec::with_capacity(augmented.tables.len());
        for (occurrence, table) in augmented.tables.iter().enumerate() {
            let mut columns = Vec::new();
            let mut values = Vec::new();
            for alias in augmented
                .aliases
                .iter()
                .filter(|alias| alias.occurrence == occurrence)
            {
                let Some(value) = row.get(&alias.name) else {
                    bail!(
                        ErrorKind::InvalidData,
                        "Result row lacks an identity column",
                        format!("column `{}` for {table}", alias.name)
                    );
                };

                columns.push(alias.column.clone());
                values.push(value.clone());
            }

            groups.push(IdentityTupleGroup {
                occurrence,
                table: table.clone(),
                identity: TableRow::new(columns, values),
            });
        }

        located.push(groups);
    }

    Ok(located)
}

/// Parses, augments and runs `sql`, returning the identity tuples of every result row.
///
/// Statements without tables are not executed and locate nothing.
pub async fn locate<S>(
    source: &S,
    resolver: &mut IdentityResolver,
    sql: &str,
    default_database: &str,
) -> ExtractResult<LocatedRows>
where
    S: SourceDatabase,
{
    let statement = parse(sql)?;
    let tables = extract_tables(&statement, default_database)?;
    if tables.is_empty() {
        return Ok(Vec::new());
    }

    let augmented = augment(source, resolver, statement, tables).await?;
    let rows = source.fetch_rows(&augmented.sql).await?;

    decompose(&augmented, &rows)
}

#[cfg(test)]
mod tests {
    use extract_mysql::types::{Cell, IndexColumn};

    use super::*;
    use crate::database::memory::MemoryDatabase;
    use crate::types::TableName;

    async fn source() -> MemoryDatabase {
        let source = MemoryDatabase::new();
        source
            .create_table(
                TableName::new("shop", "users"),
                vec![IndexColumn::new("PRIMARY", false, 1, Some("id"))],
            )
            .await;
        source
            .create_table(
                TableName::new("shop", "order_items"),
                vec![
                    IndexColumn::new("PRIMARY", false, 1, Some("order_id")),
                    IndexColumn::new("PRIMARY", false, 2, Some("line")),
                ],
            )
            .await;
        source
            .create_table(
                TableName::new("shop", "audit"),
                vec![IndexColumn::new("at_idx", true, 1, Some("at"))],
            )
            .await;

        source
    }

    #[tokio::test]
    async fn identity_columns_are_appended_per_occurrence() {
        let source = source().await;
        let mut resolver = IdentityResolver::new();

        let statement =
            parse("SELECT u.name FROM users u JOIN order_items ON order_items.order_id = u.id")
                .unwrap();
        let tables = extract_tables(&statement, "shop").unwrap();
        let augmented = augment(&source, &mut resolver, statement, tables)
            .await
            .unwrap();

        assert!(augmented.sql.starts_with(
            "SELECT u.name, `u`.`id` AS `__extract_id_0`, \
             `order_items`.`order_id` AS `__extract_id_1`, \
             `order_items`.`line` AS `__extract_id_2` FROM "
        ));
        assert_eq!(
            augmented
                .aliases
                .iter()
                .map(|alias| (alias.occurrence, alias.column.as_str()))
                .collect::<Vec<_>>(),
            vec![(0, "id"), (1, "order_id"), (1, "line")]
        );
    }

    #[tokio::test]
    async fn qualified_tables_keep_their_database_in_the_qualifier() {
        let source = source().await;
        let mut resolver = IdentityResolver::new();

        let statement = parse("SELECT * FROM shop.users").unwrap();
        let tables = extract_tables(&statement, "other").unwrap();
        let augmented = augment(&source, &mut resolver, statement, tables)
            .await
            .unwrap();

        assert_eq!(
            augmented.sql,
            "SELECT *, `shop`.`users`.`id` AS `__extract_id_0` FROM shop.users"
        );
    }

    #[tokio::test]
    async fn existing_aliases_are_not_reused() {
        let source = source().await;
        let mut resolver = IdentityResolver::new();

        let statement = parse("SELECT id AS __extract_id_0 FROM users").unwrap();
        let tables = extract_tables(&statement, "shop").unwrap();
        let augmented = augment(&source, &mut resolver, statement, tables)
            .await
            .unwrap();

        assert_eq!(augmented.aliases[0].name, "__extract_id_1");
    }

    #[tokio::test]
    async fn keyless_tables_abort_the_statement() {
        let source = source().await;
        let mut resolver = IdentityResolver::new();

        let err = locate(
            &source,
            &mut resolver,
            "SELECT * FROM users JOIN audit ON audit.user_id = users.id",
            "shop",
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingIdentityColumns);
        assert!(
            !source
                .statements()
                .await
                .iter()
                .any(|sql| sql.starts_with("SELECT"))
        );
    }

    #[tokio::test]
    async fn rows_are_split_per_occurrence() {
        let source = source().await;
        let mut resolver = IdentityResolver::new();
        source
            .push_query_result(vec![
                TableRow::from_pairs([
                    ("name", Cell::from("alice")),
                    ("__extract_id_0", Cell::I64(1)),
                    ("__extract_id_1", Cell::I64(1)),
                ]),
                TableRow::from_pairs([
                    ("name", Cell::from("bob")),
                    ("__extract_id_0", Cell::I64(2)),
                    ("__extract_id_1", Cell::I64(1)),
                ]),
            ])
            .await;

        let located = locate(
            &source,
            &mut resolver,
            "SELECT a.name FROM users a JOIN users b ON b.id = a.referrer_id",
            "shop",
        )
        .await
        .unwrap();

        assert_eq!(located.len(), 2);
        let second = &located[1];
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].occurrence, 0);
        assert_eq!(second[0].identity.get("id"), Some(&Cell::I64(2)));
        assert_eq!(second[1].occurrence, 1);
        assert_eq!(second[1].identity.get("id"), Some(&Cell::I64(1)));
        assert_eq!(second[1].table.alias.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn rows_without_identity_columns_are_invalid() {
        let source = source().await;
        let mut resolver = IdentityResolver::new();
        source
            .push_query_result(vec![TableRow::from_pairs([("name", Cell::from("alice"))])])
            .await;

        let err = locate(&source, &mut resolver, "SELECT name FROM users", "shop")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn statements_without_tables_are_not_executed() {
        let source = source().await;
        let mut resolver = IdentityResolver::new();

        let located = locate(&source, &mut resolver, "SELECT NOW()", "shop")
            .await
            .unwrap();

        assert!(located.is_empty());
        assert!(source.statements().await.is_empty());
    }
}
