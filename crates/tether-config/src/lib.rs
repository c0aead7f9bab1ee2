//! Tether Config
//!
//! Serializable configuration for the tether flows and the local agent.
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working configuration.
//!
//! Configuration is loaded from a JSON file via the CLI's `--config` flag.

mod agent;
mod screenshot;

pub use agent::AgentConfig;
pub use screenshot::ScreenshotConfig;

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file '{path}': {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file '{path}': {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_json::Error,
  },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TetherConfig {
  #[serde(default)]
  pub screenshot: ScreenshotConfig,
  #[serde(default)]
  pub agent: AgentConfig,
}

impl TetherConfig {
  /// Load configuration from a JSON file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.display().to_string(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.display().to_string(),
      source,
    })
  }
}
