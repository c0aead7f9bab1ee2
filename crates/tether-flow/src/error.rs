//! Flow, routing and runtime errors.

use crate::context::FlowId;

/// A fatal error raised by a state handler.
///
/// Any `FlowError` returned from [`Flow::step`](crate::Flow::step) aborts the
/// instance: no further state is entered and no further calls are issued.
/// Failures a handler is willing to tolerate are never raised; the handler
/// records them through [`FlowContext::log`](crate::FlowContext::log) instead.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
  /// Domain-level abort with a human-readable reason.
  #[error("{message}")]
  Abort { message: String },

  /// A state that consumes responses was entered without any.
  #[error("state '{state}' requires responses but was entered without them")]
  MissingResponses { state: &'static str },

  /// The artifact store rejected an operation.
  #[error("artifact store error: {0}")]
  Store(#[from] tether_artifact::Error),

  /// Call parameters or response payloads could not be (de)serialized.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl FlowError {
  /// Create an abort error.
  pub fn abort(message: impl Into<String>) -> Self {
    Self::Abort {
      message: message.into(),
    }
  }
}

/// A response or transition that does not match what an instance expects.
///
/// A rejected delivery never reaches a handler and never mutates the
/// instance it was addressed to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
  /// No handler is registered under this name for the flow.
  #[error("flow '{flow}' has no state named '{state}'")]
  UnknownState { flow: &'static str, state: String },

  /// The instance is not currently awaiting a response for this state.
  #[error("flow {flow_id} is not awaiting '{state}' (awaiting: {})", .awaiting.as_deref().unwrap_or("nothing"))]
  NotAwaited {
    flow_id: FlowId,
    state: String,
    awaiting: Option<String>,
  },

  /// A handler named a next state it did not declare.
  #[error("state '{from}' may not transition to '{to}'")]
  UndeclaredTransition { from: &'static str, to: &'static str },

  /// No live instance has this id.
  #[error("no running flow with id {0}")]
  UnknownInstance(FlowId),

  /// The flow's state table is inconsistent.
  #[error("invalid state table for flow '{flow}': {message}")]
  InvalidStates { flow: &'static str, message: String },
}

/// A collaborator could not accept an outbound call.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
  #[error("transport unavailable: {0}")]
  Unavailable(String),

  #[error("unknown sub-flow '{0}'")]
  UnknownSubFlow(String),
}

/// Errors surfaced by [`FlowInstance`](crate::FlowInstance) and
/// [`Scheduler`](crate::Scheduler).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  #[error(transparent)]
  Routing(#[from] RoutingError),

  /// A handler aborted the flow.
  #[error("flow {flow_id} failed in state '{state}': {source}")]
  Fatal {
    flow_id: FlowId,
    state: &'static str,
    #[source]
    source: FlowError,
  },

  #[error("flow {flow_id} has already been started")]
  AlreadyStarted { flow_id: FlowId },

  #[error("scheduler cancelled")]
  Cancelled,
}
