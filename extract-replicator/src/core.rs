use std::path::Path;

use extract::database::mysql::{MySqlDestination, MySqlSource};
use extract::log::read_log;
use extract::pipeline::{Pipeline, PipelineConfig, PipelineReport};
use extract_config::shared::{ExtractorConfig, MySqlConnectionConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{debug, info, warn};

use crate::error::ReplicatorResult;

/// Runs one extraction with the provided configuration.
///
/// Reads the query log, connects lazily to both servers and replays the log. Ctrl+C stops the
/// run after the entry being processed.
pub async fn start_extractor_with_config(
    config: ExtractorConfig,
) -> ReplicatorResult<PipelineReport> {
    info!("starting extractor");

    log_config(&config);

    let entries = read_log(&config.log_file_path).await?;
    info!(
        path = %config.log_file_path.display(),
        entries = entries.len(),
        "query log read"
    );

    let source = MySqlSource::connect_lazy(&config.source);
    let destination = MySqlDestination::connect_lazy(&config.destination);
    let mut pipeline = Pipeline::new(
        PipelineConfig::from_extractor_config(&config),
        source,
        destination,
    );

    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl+c");
            return;
        }

        info!("ctrl+c received, stopping after the current entry");
        if let Err(err) = shutdown_tx.shutdown() {
            warn!(error = ?err, "failed to send shutdown signal");
        }
    });

    let result = pipeline.run(&entries).await;

    // The run may end before ctrl+c is ever pressed.
    shutdown_handle.abort();

    let report = result?;
    info!("extractor completed");

    Ok(report)
}

/// Writes the counters collected so far to `path` in the Prometheus text format.
pub async fn write_metrics(handle: &PrometheusHandle, path: &Path) -> ReplicatorResult<()> {
    tokio::fs::write(path, handle.render()).await?;
    info!(path = %path.display(), "run metrics written");

    Ok(())
}

fn log_config(config: &ExtractorConfig) {
    log_connection_config("source", &config.source);
    log_connection_config("destination", &config.destination);
    debug!(
        mappings = config.database_mapping.len(),
        same_server = config.same_server(),
        stop_on_unsupported_nested_query = config.errors.stop_on_unsupported_nested_query,
        stop_on_missing_identity_columns = config.errors.stop_on_missing_identity_columns,
        metrics_file_path = ?config.metrics_file_path,
        "extractor config"
    );
}

fn log_connection_config(side: &str, config: &MySqlConnectionConfig) {
    debug!(
        side,
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        max_connections = config.max_connections,
        "mysql connection config",
    );
}
