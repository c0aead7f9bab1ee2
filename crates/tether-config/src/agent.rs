use serde::{Deserialize, Serialize};

/// Settings for the local agent that executes commands and serves files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
  /// stdout/stderr beyond this many bytes is truncated.
  pub max_output_bytes: usize,
  /// Files larger than this are truncated when fetched.
  pub max_file_bytes: usize,
}

impl Default for AgentConfig {
  fn default() -> Self {
    Self {
      max_output_bytes: 1024 * 1024,
      max_file_bytes: 10_000_000,
    }
  }
}
