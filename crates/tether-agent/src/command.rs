//! Command execution on the local machine.

use std::process::Stdio;

use async_trait::async_trait;
use tether_config::AgentConfig;
use tether_flow::{
  CommandChannel, CommandDescriptor, DispatchError, Responder, ResponseEnvelope, ResponseRecord,
};
use tokio::process::Command;
use tracing::{debug, warn};

/// A [`CommandChannel`] that runs every command as a local child process.
///
/// `send` returns as soon as the process is handed to the runtime; the
/// response is delivered when the process exits or its time limit runs out.
#[derive(Debug, Clone, Default)]
pub struct LocalCommandChannel {
  config: AgentConfig,
}

impl LocalCommandChannel {
  pub fn new(config: AgentConfig) -> Self {
    Self { config }
  }
}

#[async_trait]
impl CommandChannel for LocalCommandChannel {
  async fn send(
    &self,
    client_id: &str,
    descriptor: CommandDescriptor,
    responder: Responder,
  ) -> Result<(), DispatchError> {
    debug!(
      client_id = %client_id,
      flow_id = %responder.flow_id(),
      program = descriptor.program(),
      "command_spawned"
    );

    let max_output_bytes = self.config.max_output_bytes;
    tokio::spawn(async move {
      let envelope = run_command(&descriptor, max_output_bytes).await;
      responder.respond(envelope);
    });
    Ok(())
  }
}

/// Run `descriptor` to completion and describe the result.
///
/// A process that ran, whatever its exit code, yields a successful envelope
/// with one record. A process that could not be spawned or outlived its time
/// limit yields an unsuccessful one; on timeout the child is killed.
pub async fn run_command(
  descriptor: &CommandDescriptor,
  max_output_bytes: usize,
) -> ResponseEnvelope {
  let mut command = Command::new(descriptor.program());
  command
    .args(descriptor.args())
    .stdin(Stdio::null())
    .kill_on_drop(true);

  let limit = descriptor.time_limit();
  match tokio::time::timeout(limit, command.output()).await {
    Err(_) => {
      warn!(program = descriptor.program(), limit = ?limit, "command_timed_out");
      ResponseEnvelope::failed(format!("time limit of {:?} exceeded", limit))
    }
    Ok(Err(e)) => {
      warn!(program = descriptor.program(), error = %e, "command_spawn_failed");
      ResponseEnvelope::failed(format!("failed to run {}: {}", descriptor.program(), e))
    }
    Ok(Ok(output)) => {
      // No code when killed by a signal
      let exit_status = output.status.code().unwrap_or(-1);
      debug!(program = descriptor.program(), exit_status, "command_finished");

      let mut stdout = output.stdout;
      let mut stderr = output.stderr;
      stdout.truncate(max_output_bytes);
      stderr.truncate(max_output_bytes);
      ResponseEnvelope::ok(vec![ResponseRecord::output(exit_status, stdout, stderr)])
    }
  }
}
