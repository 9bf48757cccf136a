#![cfg(feature = "test-utils")]

use extract::database::mysql::{MySqlDestination, MySqlSource};
use extract::error::ErrorKind;
use extract::log::parse_log;
use extract::pipeline::Pipeline;
use extract::test_utils::database::TestDatabase;
use extract::test_utils::fixtures::pipeline_config;
use extract_telemetry::tracing::init_test_tracing;
use sqlx::Row;

const USERS_TABLE: &str =
    "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(32) NULL, referrer_id INT NULL)";

#[tokio::test(flavor = "multi_thread")]
async fn joined_rows_are_copied_between_databases() {
    init_test_tracing();
    let source = TestDatabase::spawn().await;
    let destination = TestDatabase::spawn().await;
    source.execute(USERS_TABLE).await;
    destination.execute(USERS_TABLE).await;
    source
        .execute("INSERT INTO users VALUES (1, 'alice', NULL), (2, 'bob', 1), (3, 'carol', 1)")
        .await;
    destination
        .execute("INSERT INTO users VALUES (1, 'already here', NULL)")
        .await;

    let config = pipeline_config(
        &source.config.name,
        &[(source.config.name.as_str(), destination.config.name.as_str())],
        true,
    );
    let mut pipeline = Pipeline::new(
        config,
        MySqlSource::from_pool(source.pool.clone()),
        MySqlDestination::from_pool(destination.pool.clone()),
    );

    let log = "SELECT b.name FROM users b JOIN users r ON r.id = b.referrer_id WHERE b.id = 2";
    let report = pipeline.run(&parse_log(log)).await.unwrap();

    assert_eq!(report.rows_located, 1);
    assert_eq!(report.rows_inserted, 1);
    assert_eq!(report.rows_already_present, 1);

    let rows = sqlx::query("SELECT id, name FROM users ORDER BY id")
        .fetch_all(&destination.pool)
        .await
        .unwrap();
    let rows: Vec<(i32, String)> = rows
        .iter()
        .map(|row| (row.get("id"), row.get("name")))
        .collect();
    assert_eq!(
        rows,
        vec![(1, "already here".to_owned()), (2, "bob".to_owned())]
    );

    source.destroy().await;
    destination.destroy().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn tiny_ints_and_long_times_are_copied_unchanged() {
    init_test_tracing();
    let source = TestDatabase::spawn().await;
    let destination = TestDatabase::spawn().await;
    let flags_table = "CREATE TABLE flags (id INT, level TINYINT(1), grade TINYINT(1) UNSIGNED, \
                       span TIME, PRIMARY KEY (id, level))";
    source.execute(flags_table).await;
    destination.execute(flags_table).await;
    source
        .execute("INSERT INTO flags VALUES (1, 5, 200, '100:00:00'), (2, -1, 0, '-838:59:59')")
        .await;

    let config = pipeline_config(
        &source.config.name,
        &[(source.config.name.as_str(), destination.config.name.as_str())],
        true,
    );
    let mut pipeline = Pipeline::new(
        config,
        MySqlSource::from_pool(source.pool.clone()),
        MySqlDestination::from_pool(destination.pool.clone()),
    );

    let report = pipeline
        .run(&parse_log("SELECT * FROM flags"))
        .await
        .unwrap();

    assert_eq!(report.rows_inserted, 2);
    assert_eq!(report.rows_missing_at_source, 0);

    let rows = sqlx::query(
        "SELECT id, CAST(level AS SIGNED) AS level, CAST(grade AS UNSIGNED) AS grade, \
         CAST(span AS CHAR) AS span FROM flags ORDER BY id",
    )
    .fetch_all(&destination.pool)
    .await
    .unwrap();
    let rows: Vec<(i32, i64, u64, String)> = rows
        .iter()
        .map(|row| {
            (
                row.get("id"),
                row.get("level"),
                row.get("grade"),
                row.get("span"),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            (1, 5, 200, "100:00:00".to_owned()),
            (2, -1, 0, "-838:59:59".to_owned()),
        ]
    );

    source.destroy().await;
    destination.destroy().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn tables_without_keys_are_skipped() {
    init_test_tracing();
    let source = TestDatabase::spawn().await;
    source
        .execute("CREATE TABLE events (kind VARCHAR(16), at DATETIME)")
        .await;

    let mut pipeline = Pipeline::new(
        pipeline_config(&source.config.name, &[], false),
        MySqlSource::from_pool(source.pool.clone()),
        MySqlDestination::from_pool(source.pool.clone()),
    );

    let report = pipeline
        .run(&parse_log("SELECT * FROM events"))
        .await
        .unwrap();

    assert_eq!(report.skipped.len(), 1);

    source.destroy().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_source_statements_abort_the_run() {
    init_test_tracing();
    let source = TestDatabase::spawn().await;
    source.execute(USERS_TABLE).await;

    let mut pipeline = Pipeline::new(
        pipeline_config(&source.config.name, &[], false),
        MySqlSource::from_pool(source.pool.clone()),
        MySqlDestination::from_pool(source.pool.clone()),
    );

    let err = pipeline
        .run(&parse_log("SELECT missing_column FROM users"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
    assert!(err.detail().unwrap().contains("SQL: SELECT missing_column"));

    source.destroy().await;
}
