use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the screenshot flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
  /// The only operating system family screen capture is attempted on.
  pub supported_system: String,
  pub capture_program: String,
  /// Arguments passed before the capture path.
  pub capture_args: Vec<String>,
  /// Client-side path the capture is written to before retrieval.
  pub capture_path: String,
  pub capture_time_limit_secs: u64,
  pub cleanup_program: String,
  /// Arguments passed before the capture path.
  pub cleanup_args: Vec<String>,
  pub cleanup_time_limit_secs: u64,
  /// Upper bound on bytes read from the retrieved capture.
  pub max_read_bytes: usize,
}

impl ScreenshotConfig {
  pub fn capture_time_limit(&self) -> Duration {
    Duration::from_secs(self.capture_time_limit_secs)
  }

  pub fn cleanup_time_limit(&self) -> Duration {
    Duration::from_secs(self.cleanup_time_limit_secs)
  }
}

impl Default for ScreenshotConfig {
  fn default() -> Self {
    Self {
      supported_system: "Darwin".to_string(),
      capture_program: "/usr/sbin/screencapture".to_string(),
      capture_args: vec!["-x".to_string(), "-t".to_string(), "jpg".to_string()],
      capture_path: "/tmp/ss.dat".to_string(),
      capture_time_limit_secs: 15,
      cleanup_program: "/bin/rm".to_string(),
      cleanup_args: vec!["-f".to_string()],
      cleanup_time_limit_secs: 15,
      max_read_bytes: 10_000_000,
    }
  }
}
