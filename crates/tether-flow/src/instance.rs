//! A single flow instance and its transition logic.

use tracing::{debug, error, info, instrument};

use crate::command::OutboundCall;
use crate::context::{FlowContext, FlowId};
use crate::envelope::ResponseEnvelope;
use crate::error::{RoutingError, RuntimeError};
use crate::flow::{Flow, FlowState, Transition};

/// Lifecycle of an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStatus<S> {
  /// Created, `start` not yet called.
  Created,
  /// A handler is executing.
  Running(S),
  /// Suspended until the response for this state is delivered.
  Waiting(S),
  /// The terminal handler finished.
  Completed,
  /// A handler aborted the flow in this state.
  Failed { state: S, error: String },
}

impl<S: FlowState> FlowStatus<S> {
  /// The state whose response the instance is waiting for.
  pub fn awaiting(&self) -> Option<S> {
    match self {
      Self::Waiting(state) => Some(*state),
      _ => None,
    }
  }

  pub fn is_finished(&self) -> bool {
    matches!(self, Self::Completed | Self::Failed { .. })
  }
}

/// What the orchestrator must do after a handler returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
  /// Dispatch `call`; deliver its result to `state`.
  Suspended {
    state: &'static str,
    call: OutboundCall,
  },
  /// The flow has completed.
  Finished,
}

/// One running flow: its instance variables, its context, and where it is.
///
/// An instance has at most one outstanding call. `start` may only run once,
/// and `resume` only succeeds for the exact state the last handler suspended
/// into; anything else is rejected before any handler runs.
pub struct FlowInstance<F: Flow> {
  flow: F,
  ctx: FlowContext,
  status: FlowStatus<F::State>,
  last_state: Option<F::State>,
}

impl<F: Flow> FlowInstance<F> {
  pub fn new(flow: F, ctx: FlowContext) -> Self {
    Self {
      flow,
      ctx,
      status: FlowStatus::Created,
      last_state: None,
    }
  }

  pub fn id(&self) -> &FlowId {
    self.ctx.flow_id()
  }

  pub fn context(&self) -> &FlowContext {
    &self.ctx
  }

  pub fn flow(&self) -> &F {
    &self.flow
  }

  pub fn status(&self) -> &FlowStatus<F::State> {
    &self.status
  }

  /// The last state whose handler ran.
  pub fn last_state(&self) -> Option<F::State> {
    self.last_state
  }

  /// Run the initial handler.
  #[instrument(
    name = "flow_start",
    skip(self),
    fields(flow = F::NAME, flow_id = %self.ctx.flow_id(), client_id = %self.ctx.client_id())
  )]
  pub async fn start(&mut self) -> Result<Progress, RuntimeError> {
    if !matches!(self.status, FlowStatus::Created) {
      return Err(RuntimeError::AlreadyStarted {
        flow_id: self.id().clone(),
      });
    }

    info!(
      flow_id = %self.ctx.flow_id(),
      flow = F::NAME,
      client_id = %self.ctx.client_id(),
      owner = %self.ctx.owner(),
      "flow_started"
    );

    self.run(F::State::INITIAL, None).await
  }

  /// Deliver the response for `state` and run its handler.
  #[instrument(
    name = "flow_resume",
    skip(self, responses),
    fields(flow = F::NAME, flow_id = %self.ctx.flow_id())
  )]
  pub async fn resume(
    &mut self,
    state: &str,
    responses: ResponseEnvelope,
  ) -> Result<Progress, RuntimeError> {
    let state = self.route(state)?;
    self.run(state, Some(responses)).await
  }

  /// Validate a delivery against the awaited state without touching the
  /// instance.
  pub fn route(&self, name: &str) -> Result<F::State, RoutingError> {
    let state = F::State::from_name(name).ok_or_else(|| RoutingError::UnknownState {
      flow: F::NAME,
      state: name.to_string(),
    })?;

    match self.status.awaiting() {
      Some(awaited) if awaited == state => Ok(state),
      awaited => Err(RoutingError::NotAwaited {
        flow_id: self.id().clone(),
        state: name.to_string(),
        awaiting: awaited.map(|s| s.name().to_string()),
      }),
    }
  }

  async fn run(
    &mut self,
    mut state: F::State,
    mut responses: Option<ResponseEnvelope>,
  ) -> Result<Progress, RuntimeError> {
    loop {
      self.status = FlowStatus::Running(state);
      self.last_state = Some(state);
      debug!(flow_id = %self.ctx.flow_id(), state = state.name(), "state_entered");

      let transition = match self.flow.step(state, responses.take(), &self.ctx).await {
        Ok(transition) => transition,
        Err(source) => {
          self.fail(state, source.to_string());
          return Err(RuntimeError::Fatal {
            flow_id: self.id().clone(),
            state: state.name(),
            source,
          });
        }
      };

      match transition {
        Transition::Call { call, next } => {
          if !state.next_states().contains(&next) {
            let err = RoutingError::UndeclaredTransition {
              from: state.name(),
              to: next.name(),
            };
            self.fail(state, err.to_string());
            return Err(err.into());
          }

          info!(
            flow_id = %self.ctx.flow_id(),
            state = state.name(),
            next_state = next.name(),
            call = call.label(),
            "flow_suspended"
          );
          self.status = FlowStatus::Waiting(next);
          return Ok(Progress::Suspended {
            state: next.name(),
            call,
          });
        }
        Transition::Done if state == F::State::TERMINAL => {
          info!(flow_id = %self.ctx.flow_id(), flow = F::NAME, "flow_completed");
          self.status = FlowStatus::Completed;
          return Ok(Progress::Finished);
        }
        Transition::Done => {
          state = F::State::TERMINAL;
        }
      }
    }
  }

  fn fail(&mut self, state: F::State, error: String) {
    error!(
      flow_id = %self.ctx.flow_id(),
      flow = F::NAME,
      state = state.name(),
      error = %error,
      "flow_failed"
    );
    self.status = FlowStatus::Failed { state, error };
  }
}
