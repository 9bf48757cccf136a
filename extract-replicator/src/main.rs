//! Extractor binary.
//!
//! Loads the configuration, replays the configured query log against the source server and
//! copies the rows it read into the destination server. The run summary goes to stdout, logs
//! to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use extract_config::shared::ExtractorConfig;
use extract_telemetry::metrics::init_metrics;
use extract_telemetry::tracing::init_tracing;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::error;

use crate::config::load_replicator_config;
use crate::core::{start_extractor_with_config, write_metrics};
use crate::error::{ReplicatorError, ReplicatorResult};
use crate::report::render_summary;

mod config;
mod core;
mod error;
mod report;

/// Copies the rows read by a log of SELECT statements from one MySQL server to another.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Directory holding `base.yaml` and the environment overlays.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Query log to replay, overriding `log_file_path`.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> ReplicatorResult<()> {
    let config = load_replicator_config(args.config_dir.as_deref(), args.log_file)?;

    let _log_flusher = init_tracing("extract_replicator").map_err(ReplicatorError::config)?;
    let metrics_handle = init_metrics().map_err(ReplicatorError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config, metrics_handle))
}

async fn async_main(
    config: ExtractorConfig,
    metrics_handle: PrometheusHandle,
) -> ReplicatorResult<()> {
    let metrics_file_path = config.metrics_file_path.clone();
    let result = start_extractor_with_config(config).await;

    // Counters of a failed run are written too.
    if let Some(path) = metrics_file_path {
        write_metrics(&metrics_handle, &path).await?;
    }

    match result {
        Ok(report) => {
            print!("{}", render_summary(&report));
            Ok(())
        }
        Err(err) => {
            error!("{err}");
            Err(err)
        }
    }
}
