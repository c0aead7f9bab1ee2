use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A command for the remote agent to execute.
///
/// Descriptors are immutable. A run that exceeds `time_limit` is reported
/// back as an unsuccessful response; nothing at this layer retries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
  program: String,
  args: Vec<String>,
  time_limit: Duration,
}

impl CommandDescriptor {
  pub fn new(
    program: impl Into<String>,
    args: impl IntoIterator<Item = impl Into<String>>,
    time_limit: Duration,
  ) -> Self {
    Self {
      program: program.into(),
      args: args.into_iter().map(Into::into).collect(),
      time_limit,
    }
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  pub fn args(&self) -> &[String] {
    &self.args
  }

  pub fn time_limit(&self) -> Duration {
    self.time_limit
  }
}

/// The single outbound call a handler may issue before suspending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum OutboundCall {
  /// Execute a command on the remote agent.
  Command(CommandDescriptor),
  /// Run a named child flow and deliver its terminal result.
  SubFlow {
    name: String,
    params: serde_json::Value,
  },
}

impl OutboundCall {
  /// Short label for logs.
  pub fn label(&self) -> &str {
    match self {
      Self::Command(descriptor) => descriptor.program(),
      Self::SubFlow { name, .. } => name,
    }
  }
}
