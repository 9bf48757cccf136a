use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{MySqlConnectionConfig, ValidationError};

/// How the extractor reacts to recoverable per-entry failures.
///
/// Both flags default to `false`: the offending entry is reported and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorPolicyConfig {
    /// Abort the run when a statement selects from a sub-query.
    #[serde(default)]
    pub stop_on_unsupported_nested_query: bool,
    /// Abort the run when a referenced table has neither a primary key nor a unique index.
    #[serde(default)]
    pub stop_on_missing_identity_columns: bool,
}

/// Complete configuration of the extractor binary.
///
/// This intentionally does not implement [`Serialize`] since it carries database passwords.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExtractorConfig {
    /// Server the logged queries are replayed against.
    pub source: MySqlConnectionConfig,
    /// Server the located rows are copied into.
    pub destination: MySqlConnectionConfig,
    /// Maps a source database name to the destination database receiving its rows.
    ///
    /// Databases without an entry are replicated into a database with the same name, which is
    /// refused when source and destination are the same server.
    #[serde(default)]
    pub database_mapping: HashMap<String, String>,
    /// Path of the query log, one statement per line.
    pub log_file_path: PathBuf,
    /// Per-entry failure policy.
    #[serde(default)]
    pub errors: ErrorPolicyConfig,
    /// File receiving the run counters in the Prometheus text format once the run ends.
    #[serde(default)]
    pub metrics_file_path: Option<PathBuf>,
}

impl ExtractorConfig {
    /// Validates the whole configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate("source")?;
        self.destination.validate("destination")?;

        for (source, target) in &self.database_mapping {
            if source.trim().is_empty() || target.trim().is_empty() {
                return Err(ValidationError::EmptyMappingEntry(format!(
                    "{source} -> {target}"
                )));
            }
        }

        if self.log_file_path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyLogFilePath);
        }

        Ok(())
    }

    /// Returns `true` when source and destination point at the same server.
    pub fn same_server(&self) -> bool {
        self.source.is_same_server(&self.destination)
    }
}

impl Config for ExtractorConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "source": {"host": "prod-db", "name": "shop", "username": "reader"},
        "destination": {"host": "localhost", "port": 3307, "name": "shop_copy", "username": "root"},
        "database_mapping": {"shop": "shop_copy"},
        "log_file_path": "queries.log"
    }"#;

    #[test]
    fn deserializes_with_default_error_policy() {
        let config: ExtractorConfig = serde_json::from_str(CONFIG).unwrap();

        assert_eq!(config.errors, ErrorPolicyConfig::default());
        assert_eq!(config.metrics_file_path, None);
        assert_eq!(config.database_mapping["shop"], "shop_copy");
        assert!(config.validate().is_ok());
        assert!(!config.same_server());
    }

    #[test]
    fn empty_mapping_target_is_rejected() {
        let mut config: ExtractorConfig = serde_json::from_str(CONFIG).unwrap();
        config
            .database_mapping
            .insert("orders".to_owned(), " ".to_owned());

        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyMappingEntry(_))
        ));
    }
}
