//! Tether Agent
//!
//! Collaborators that serve tether flows on the local machine:
//!
//! - [`LocalCommandChannel`] runs each command as a child process and
//!   enforces its time limit.
//! - [`LocalFileFetcher`] serves the `GetFile` sub-flow by copying a local
//!   file into the artifact store.
//! - [`enroll`] interrogates the host and writes the client snapshot flows
//!   read their hostname and system from.

mod command;
mod fetch;
mod interrogate;

pub use command::{LocalCommandChannel, run_command};
pub use fetch::LocalFileFetcher;
pub use interrogate::{ClientInfo, enroll, system_name};

use tether_artifact::{ArtifactStore, Urn};

/// Errors raised by the local agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
  #[error("failed to read '{path}': {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to determine hostname: {0}")]
  Hostname(#[source] std::io::Error),

  #[error(transparent)]
  Store(#[from] tether_artifact::Error),
}

/// Delete `urn` if it exists.
pub(crate) async fn remove_existing(store: &dyn ArtifactStore, urn: &Urn) -> Result<(), AgentError> {
  match store.delete(urn).await {
    Ok(()) | Err(tether_artifact::Error::NotFound(_)) => Ok(()),
    Err(e) => Err(e.into()),
  }
}
