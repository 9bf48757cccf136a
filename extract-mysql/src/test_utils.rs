use extract_config::shared::{IntoConnectOptions, MySqlConnectionConfig};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{ConnectOptions, Executor, MySqlPool};

use crate::types::quote_identifier;

/// Creates the database named in `config` and returns a pool connected to it.
///
/// # Panics
///
/// Panics if the server is unreachable or the database cannot be created.
pub async fn create_mysql_database(config: &MySqlConnectionConfig) -> MySqlPool {
    let options: MySqlConnectOptions = config.without_db();
    let mut connection = options
        .connect()
        .await
        .expect("Failed to connect to MySQL");

    connection
        .execute(&*format!("CREATE DATABASE {}", quote_identifier(&config.name)))
        .await
        .expect("Failed to create database");

    let options: MySqlConnectOptions = config.with_db();
    MySqlPool::connect_with(options)
        .await
        .expect("Failed to connect to MySQL database")
}

/// Drops the database named in `config` if it exists.
///
/// # Panics
///
/// Panics if the server is unreachable or the drop fails.
pub async fn drop_mysql_database(config: &MySqlConnectionConfig) {
    let options: MySqlConnectOptions = config.without_db();
    let mut connection = options
        .connect()
        .await
        .expect("Failed to connect to MySQL");

    connection
        .execute(&*format!(
            "DROP DATABASE IF EXISTS {}",
            quote_identifier(&config.name)
        ))
        .await
        .expect("Failed to destroy database");
}
