use std::path::{Path, PathBuf};

use extract_config::shared::ExtractorConfig;
use extract_config::{load_config, load_config_from};

use crate::error::{ReplicatorError, ReplicatorResult};

/// Loads and validates the extractor configuration.
///
/// Reads `configuration/` in the working directory unless `config_dir` is given. `log_file`
/// replaces the configured query log path.
pub fn load_replicator_config(
    config_dir: Option<&Path>,
    log_file: Option<PathBuf>,
) -> ReplicatorResult<ExtractorConfig> {
    let mut config = match config_dir {
        Some(directory) => load_config_from::<ExtractorConfig>(directory),
        None => load_config::<ExtractorConfig>(),
    }
    .map_err(ReplicatorError::config)?;

    if let Some(log_file) = log_file {
        config.log_file_path = log_file;
    }

    config.validate().map_err(ReplicatorError::config)?;

    Ok(config)
}
