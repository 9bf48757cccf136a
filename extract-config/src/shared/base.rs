use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A connection has no host.
    #[error("`{0}.host` cannot be empty")]
    EmptyHost(&'static str),
    /// A connection has no username.
    #[error("`{0}.username` cannot be empty")]
    EmptyUsername(&'static str),
    /// A connection has no default database.
    #[error("`{0}.name` cannot be empty")]
    EmptyDatabaseName(&'static str),
    /// The pool would never open a connection.
    #[error("`{0}.max_connections` cannot be zero")]
    MaxConnectionsZero(&'static str),
    /// A database mapping has an empty source or target.
    #[error("Invalid database mapping `{0}`: source and target names cannot be empty")]
    EmptyMappingEntry(String),
    /// No log file was configured.
    #[error("`log_file_path` cannot be empty")]
    EmptyLogFilePath,
}
