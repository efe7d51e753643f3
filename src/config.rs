//! Layered configuration
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. `stepwise.toml` in the working directory (optional), or the file given
//!    with `--config` (required when given)
//! 3. `STEPWISE_*` environment variables, nested keys separated by `__`
//!    (`STEPWISE_LOGGING__FILTER=debug`, `STEPWISE_LIMITS__MAX_SEQUENCE_LEN=500`)
//!
//! `.env` loading is left to the binary so library callers keep control of
//! their environment.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::interpreter::expression::Limits;

pub const DEFAULT_CONFIG_FILE: &str = "stepwise";
pub const ENV_PREFIX: &str = "STEPWISE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application id handed to the session builder (`scm` -> `SCMAPI`)
    pub app_id: String,
    pub logging: LoggingConfig,
    pub limits: Limits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub with_target: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: "scm".to_string(),
            logging: LoggingConfig::default(),
            limits: Limits::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            with_target: false,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = ::config::Config::builder()
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
