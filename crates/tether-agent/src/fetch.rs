//! The GetFile sub-flow, served from the local filesystem.

use std::sync::Arc;

use async_trait::async_trait;
use tether_artifact::{ArtifactKind, ArtifactStore, Pathspec, Urn, attributes};
use tether_config::AgentConfig;
use tether_flow::{DispatchError, Responder, ResponseEnvelope, ResponseRecord, SubFlowInvoker};
use tether_flows::{GET_FILE, GetFileArgs};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::{AgentError, remove_existing};

/// A [`SubFlowInvoker`] that serves [`GET_FILE`] by copying a local file
/// into the artifact store.
///
/// The copy lands at `pathspec.to_urn(client)`, replacing any earlier copy,
/// and the sub-flow responds with a single record referencing it.
#[derive(Clone)]
pub struct LocalFileFetcher {
  store: Arc<dyn ArtifactStore>,
  config: AgentConfig,
}

impl LocalFileFetcher {
  pub fn new(store: Arc<dyn ArtifactStore>, config: AgentConfig) -> Self {
    Self { store, config }
  }

  /// Copy the file at `pathspec` into `client`'s namespace.
  ///
  /// At most `max_file_bytes` are copied.
  pub async fn fetch(&self, client: &Urn, pathspec: &Pathspec) -> Result<Urn, AgentError> {
    let read_error = |source| AgentError::Read {
      path: pathspec.path.clone(),
      source,
    };

    let file = tokio::fs::File::open(&pathspec.path)
      .await
      .map_err(read_error)?;
    let mut data = Vec::new();
    file
      .take(self.config.max_file_bytes as u64)
      .read_to_end(&mut data)
      .await
      .map_err(read_error)?;

    let urn = pathspec.to_urn(client);
    remove_existing(self.store.as_ref(), &urn).await?;

    let mut writer = self.store.create(&urn, ArtifactKind::File).await?;
    writer.set_attribute(attributes::PATH, pathspec.path.as_str());
    writer.write(&data);
    self.store.close(writer).await?;

    info!(urn = %urn, size = data.len(), "file_fetched");
    Ok(urn)
  }
}

#[async_trait]
impl SubFlowInvoker for LocalFileFetcher {
  async fn invoke(
    &self,
    client_id: &str,
    name: &str,
    params: serde_json::Value,
    responder: Responder,
  ) -> Result<(), DispatchError> {
    if name != GET_FILE {
      return Err(DispatchError::UnknownSubFlow(name.to_string()));
    }

    let args = match GetFileArgs::from_params(params) {
      Ok(args) => args,
      Err(e) => {
        let message = format!("invalid {} parameters: {}", GET_FILE, e);
        responder.respond(ResponseEnvelope::failed(message));
        return Ok(());
      }
    };

    let fetcher = self.clone();
    let client = Urn::root().join(client_id);
    tokio::spawn(async move {
      let envelope = match fetcher.fetch(&client, &args.pathspec).await {
        Ok(urn) => ResponseEnvelope::ok(vec![ResponseRecord::artifact(urn)]),
        Err(e) => {
          warn!(client = %client, path = %args.pathspec.path, error = %e, "file_fetch_failed");
          ResponseEnvelope::failed(e.to_string())
        }
      };
      responder.respond(envelope);
    });
    Ok(())
  }
}
