use serde::{Deserialize, Serialize};
use tether_artifact::Pathspec;
use tether_flow::OutboundCall;

/// Name of the sub-flow that copies a client file into the artifact store.
///
/// On success it responds with a single record referencing the stored
/// object, at `pathspec.to_urn(client)`.
pub const GET_FILE: &str = "GetFile";

/// Parameters of the [`GET_FILE`] sub-flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetFileArgs {
  pub pathspec: Pathspec,
}

impl GetFileArgs {
  pub fn new(pathspec: Pathspec) -> Self {
    Self { pathspec }
  }

  /// Build the outbound call that runs the sub-flow with these arguments.
  pub fn into_call(self) -> Result<OutboundCall, serde_json::Error> {
    Ok(OutboundCall::SubFlow {
      name: GET_FILE.to_string(),
      params: serde_json::to_value(self)?,
    })
  }

  /// Decode the parameters a [`GET_FILE`] call was issued with.
  pub fn from_params(params: serde_json::Value) -> Result<Self, serde_json::Error> {
    serde_json::from_value(params)
  }
}
