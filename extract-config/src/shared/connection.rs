use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;

use crate::shared::ValidationError;

const fn default_port() -> u16 {
    3306
}

const fn default_max_connections() -> u32 {
    2
}

/// Host names that all resolve to the local machine.
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]"];

/// Connection settings for one MySQL server.
///
/// `name` is the default database: tables referenced without a database qualifier are looked
/// up there.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MySqlConnectionConfig {
    /// Hostname or IP address of the server.
    pub host: String,
    /// Port the server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Default database.
    pub name: String,
    /// User to authenticate as.
    pub username: String,
    /// Password for `username`. Redacted in debug output.
    pub password: Option<SecretString>,
    /// Upper bound for the connection pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl MySqlConnectionConfig {
    /// Validates the connection settings. `side` names the block in error messages.
    pub fn validate(&self, side: &'static str) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::EmptyHost(side));
        }

        if self.username.trim().is_empty() {
            return Err(ValidationError::EmptyUsername(side));
        }

        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyDatabaseName(side));
        }

        if self.max_connections == 0 {
            return Err(ValidationError::MaxConnectionsZero(side));
        }

        Ok(())
    }

    /// Returns `true` when both configurations point at the same server.
    ///
    /// Hosts are compared case-insensitively and the common loopback spellings are treated as
    /// one host, so `localhost:3306` and `127.0.0.1:3306` count as the same server.
    pub fn is_same_server(&self, other: &MySqlConnectionConfig) -> bool {
        self.port == other.port && normalized_host(&self.host) == normalized_host(&other.host)
    }
}

fn normalized_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    if LOOPBACK_HOSTS.contains(&host.as_str()) {
        return "localhost".to_owned();
    }

    host
}

/// Converts a connection config into driver specific connect options.
pub trait IntoConnectOptions<Output> {
    /// Options for connecting to the server without selecting a database.
    ///
    /// Used by test helpers that create and drop databases.
    fn without_db(&self) -> Output;

    /// Options for connecting with the default database selected.
    fn with_db(&self) -> Output;
}

impl IntoConnectOptions<MySqlConnectOptions> for MySqlConnectionConfig {
    fn without_db(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .charset("utf8mb4");

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        options
    }

    fn with_db(&self) -> MySqlConnectOptions {
        let options: MySqlConnectOptions = self.without_db();
        options.database(&self.name)
    }
}
