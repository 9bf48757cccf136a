use extract_config::shared::MySqlConnectionConfig;
use extract_mysql::test_utils::{create_mysql_database, drop_mysql_database};
use secrecy::SecretString;
use sqlx::MySqlPool;
use uuid::Uuid;

/// Generates connection settings for a uniquely named database on the test server.
///
/// Configuration is read from environment variables:
/// - `TESTS_DATABASE_HOST`: MySQL server hostname (required)
/// - `TESTS_DATABASE_PORT`: MySQL server port (required)
/// - `TESTS_DATABASE_USERNAME`: Database user (required)
/// - `TESTS_DATABASE_PASSWORD`: Database password (optional)
pub fn local_mysql_connection_config() -> MySqlConnectionConfig {
    MySqlConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: format!("test_{}", Uuid::new_v4().simple()),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(SecretString::new),
        max_connections: 2,
    }
}

/// A throwaway database on the test server.
pub struct TestDatabase {
    pub config: MySqlConnectionConfig,
    pub pool: MySqlPool,
}

impl TestDatabase {
    /// Creates a database with a random name.
    ///
    /// # Panics
    ///
    /// Panics if the server is unreachable or the database cannot be created.
    pub async fn spawn() -> Self {
        let config = local_mysql_connection_config();
        let pool = create_mysql_database(&config).await;

        Self { config, pool }
    }

    /// Runs `sql` on the database.
    ///
    /// # Panics
    ///
    /// Panics if the statement fails.
    pub async fn execute(&self, sql: &str) {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .unwrap_or_else(|err| panic!("Failed to run `{sql}`: {err}"));
    }

    /// Closes the pool and drops the database.
    pub async fn destroy(self) {
        self.pool.close().await;
        drop_mysql_database(&self.config).await;
    }
}
