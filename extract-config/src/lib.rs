//! Configuration for the row extractor.
//!
//! Holds the connection settings for the source and destination MySQL servers, the database
//! mapping used when replicating rows, and the per-entry error policy. Configuration is read
//! from layered YAML files and `APP_`-prefixed environment variables with [`load_config`].

pub mod environment;
mod load;
pub mod shared;

pub use load::{CONFIGURATION_DIR, Config, LoadConfigError, load_config, load_config_from};
