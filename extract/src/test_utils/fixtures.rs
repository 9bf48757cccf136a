use std::collections::HashMap;

use extract_config::shared::ErrorPolicyConfig;
use extract_mysql::types::IndexColumn;

use crate::database::memory::MemoryDatabase;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::replication::DatabaseMapping;
use crate::types::{Cell, TableName, TableRow};

/// Returns the `SHOW INDEXES` rows of a primary key over `columns`.
pub fn primary_key(columns: &[&str]) -> Vec<IndexColumn> {
    columns
        .iter()
        .enumerate()
        .map(|(position, column)| {
            IndexColumn::new("PRIMARY", false, position as u32 + 1, Some(column))
        })
        .collect()
}

/// Builds a row of `users` with the `id` and `name` columns.
pub fn user_row(id: i64, name: &str) -> TableRow {
    TableRow::from_pairs([("id", Cell::I64(id)), ("name", Cell::from(name))])
}

/// Creates a pipeline configuration reading unqualified tables from `default_database`.
///
/// `mapping` lists `(source, destination)` database pairs.
pub fn pipeline_config(
    default_database: &str,
    mapping: &[(&str, &str)],
    same_server: bool,
) -> PipelineConfig {
    let entries: HashMap<String, String> = mapping
        .iter()
        .map(|(source, destination)| ((*source).to_owned(), (*destination).to_owned()))
        .collect();

    PipelineConfig {
        default_database: default_database.to_owned(),
        mapping: DatabaseMapping::new(entries, same_server),
        errors: ErrorPolicyConfig::default(),
    }
}

/// An in-memory source and destination, each holding a `users` table keyed by `id`.
///
/// The source table lives in `source_database` and the destination one in
/// `destination_database`.
pub struct MemoryScenario {
    pub source: MemoryDatabase,
    pub destination: MemoryDatabase,
    pub source_users: TableName,
    pub destination_users: TableName,
}

impl MemoryScenario {
    pub async fn new(source_database: &str, destination_database: &str) -> Self {
        let source_users = TableName::new(source_database, "users");
        let destination_users = TableName::new(destination_database, "users");

        let source = MemoryDatabase::new();
        source
            .create_table(source_users.clone(), primary_key(&["id"]))
            .await;

        let destination = MemoryDatabase::new();
        destination
            .create_table(destination_users.clone(), primary_key(&["id"]))
            .await;

        Self {
            source,
            destination,
            source_users,
            destination_users,
        }
    }

    /// Builds a pipeline over clones of both databases.
    pub fn pipeline(&self, config: PipelineConfig) -> Pipeline<MemoryDatabase, MemoryDatabase> {
        Pipeline::new(config, self.source.clone(), self.destination.clone())
    }
}
