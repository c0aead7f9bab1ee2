//! Outbound call transport: the collaborator traits and the reply path.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::command::CommandDescriptor;
use crate::context::FlowId;
use crate::envelope::ResponseEnvelope;
use crate::error::DispatchError;

/// A response addressed to one (instance, state) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
  pub flow_id: FlowId,
  pub state: String,
  pub envelope: ResponseEnvelope,
}

/// Error text delivered when a responder is dropped without answering.
pub const RESPONDER_DROPPED: &str = "responder dropped without a response";

/// The reply path for one outbound call.
///
/// A responder is consumed by [`Responder::respond`], so each call produces
/// at most one response. Dropping it unanswered closes the reply channel,
/// which the receiving side turns into a failed response.
#[derive(Debug)]
pub struct Responder {
  flow_id: FlowId,
  state: String,
  reply: oneshot::Sender<ResponseEnvelope>,
}

impl Responder {
  /// Create a responder for `state` of `flow_id` and the receiver its
  /// response arrives on.
  pub fn channel(
    flow_id: FlowId,
    state: impl Into<String>,
  ) -> (Self, oneshot::Receiver<ResponseEnvelope>) {
    let (reply, receiver) = oneshot::channel();
    let responder = Self {
      flow_id,
      state: state.into(),
      reply,
    };
    (responder, receiver)
  }

  pub fn flow_id(&self) -> &FlowId {
    &self.flow_id
  }

  /// The state the response will be delivered to.
  pub fn state(&self) -> &str {
    &self.state
  }

  /// Deliver the call's result.
  pub fn respond(self, envelope: ResponseEnvelope) {
    // Receiver may have been dropped (scheduler shut down)
    let _ = self.reply.send(envelope);
  }
}

/// Wait for `responder`'s answer and forward it to `deliveries`.
///
/// A responder dropped without answering is forwarded as a failed response
/// carrying [`RESPONDER_DROPPED`].
pub(crate) async fn forward(
  flow_id: FlowId,
  state: String,
  reply: oneshot::Receiver<ResponseEnvelope>,
  deliveries: mpsc::UnboundedSender<Delivery>,
) {
  let envelope = match reply.await {
    Ok(envelope) => envelope,
    Err(_) => {
      warn!(flow_id = %flow_id, state = %state, "responder_dropped");
      ResponseEnvelope::failed(RESPONDER_DROPPED)
    }
  };
  let _ = deliveries.send(Delivery {
    flow_id,
    state,
    envelope,
  });
}

/// Carries commands to the remote agent.
#[async_trait]
pub trait CommandChannel: Send + Sync {
  /// Hand `descriptor` to the agent serving `client_id`.
  ///
  /// Must not wait for the command to finish; the result is delivered later
  /// through `responder`. A time-limit breach is delivered as an
  /// unsuccessful envelope.
  async fn send(
    &self,
    client_id: &str,
    descriptor: CommandDescriptor,
    responder: Responder,
  ) -> Result<(), DispatchError>;
}

/// Launches child flows on a parent's behalf.
#[async_trait]
pub trait SubFlowInvoker: Send + Sync {
  /// Start the child flow `name` for `client_id`.
  ///
  /// The child's terminal result is delivered later through `responder`.
  async fn invoke(
    &self,
    client_id: &str,
    name: &str,
    params: serde_json::Value,
    responder: Responder,
  ) -> Result<(), DispatchError>;
}
