//! Scheduler that drives flow instances from a single delivery queue.
//!
//! The scheduler owns every live instance. Each instance is touched only
//! while a delivery addressed to it is being processed, and an instance has
//! at most one call outstanding, so handlers of one instance never overlap.
//! Independent instances interleave freely.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::OutboundCall;
use crate::context::{FlowContext, FlowId, Services};
use crate::dispatch::{CommandChannel, Delivery, Responder, SubFlowInvoker, forward};
use crate::envelope::ResponseEnvelope;
use crate::error::{RoutingError, RuntimeError};
use crate::flow::{Flow, FlowState, validate_states};
use crate::instance::{FlowInstance, Progress};

/// How a finished instance ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum OutcomeStatus {
  Completed,
  Failed { error: String },
}

/// Archived record of a finished instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowOutcome {
  pub flow_id: FlowId,
  pub flow: String,
  pub client_id: String,
  /// The last state whose handler ran.
  pub final_state: Option<String>,
  #[serde(flatten)]
  pub status: OutcomeStatus,
}

impl FlowOutcome {
  pub fn is_completed(&self) -> bool {
    matches!(self.status, OutcomeStatus::Completed)
  }
}

/// Object-safe view of a [`FlowInstance`] so instances of different flow
/// kinds can share one scheduler.
#[async_trait]
trait Runnable: Send + Sync {
  fn flow_name(&self) -> &'static str;
  fn client_id(&self) -> &str;
  fn last_state(&self) -> Option<&'static str>;
  fn is_finished(&self) -> bool;
  async fn start(&mut self) -> Result<Progress, RuntimeError>;
  async fn resume(
    &mut self,
    state: &str,
    responses: ResponseEnvelope,
  ) -> Result<Progress, RuntimeError>;
}

#[async_trait]
impl<F: Flow> Runnable for FlowInstance<F> {
  fn flow_name(&self) -> &'static str {
    F::NAME
  }

  fn client_id(&self) -> &str {
    self.context().client_id()
  }

  fn last_state(&self) -> Option<&'static str> {
    FlowInstance::last_state(self).map(|state| state.name())
  }

  fn is_finished(&self) -> bool {
    self.status().is_finished()
  }

  async fn start(&mut self) -> Result<Progress, RuntimeError> {
    FlowInstance::start(self).await
  }

  async fn resume(
    &mut self,
    state: &str,
    responses: ResponseEnvelope,
  ) -> Result<Progress, RuntimeError> {
    FlowInstance::resume(self, state, responses).await
  }
}

/// Runs flow instances against a command channel and a sub-flow invoker.
///
/// # Usage
///
/// ```ignore
/// let mut scheduler = Scheduler::new(services, commands, subflows);
/// let flow_id = scheduler.start(TakeScreenshot::new(config), "C.1", "analyst").await?;
///
/// let cancel = CancellationToken::new();
/// scheduler.run_until_idle(cancel).await?;
///
/// let outcome = scheduler.outcome(&flow_id);
/// ```
pub struct Scheduler {
  services: Services,
  commands: Arc<dyn CommandChannel>,
  subflows: Arc<dyn SubFlowInvoker>,
  sender: mpsc::UnboundedSender<Delivery>,
  receiver: mpsc::UnboundedReceiver<Delivery>,
  instances: HashMap<FlowId, Box<dyn Runnable>>,
  outcomes: HashMap<FlowId, FlowOutcome>,
}

impl Scheduler {
  pub fn new(
    services: Services,
    commands: Arc<dyn CommandChannel>,
    subflows: Arc<dyn SubFlowInvoker>,
  ) -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      services,
      commands,
      subflows,
      sender,
      receiver,
      instances: HashMap::new(),
      outcomes: HashMap::new(),
    }
  }

  /// Sender for deliveries produced outside the registered collaborators.
  pub fn sender(&self) -> mpsc::UnboundedSender<Delivery> {
    self.sender.clone()
  }

  /// Number of instances that have not finished.
  pub fn running(&self) -> usize {
    self.instances.len()
  }

  pub fn is_idle(&self) -> bool {
    self.instances.is_empty()
  }

  /// The archived outcome of a finished instance.
  pub fn outcome(&self, flow_id: &FlowId) -> Option<&FlowOutcome> {
    self.outcomes.get(flow_id)
  }

  /// Create an instance of `flow` for `client_id` and run its initial
  /// handler.
  ///
  /// A fatal error from the initial handler is returned here and also
  /// archived as the instance's outcome.
  pub async fn start<F: Flow>(
    &mut self,
    flow: F,
    client_id: impl Into<String>,
    owner: impl Into<String>,
  ) -> Result<FlowId, RuntimeError> {
    validate_states::<F>()?;

    let flow_id = FlowId::new();
    let ctx = FlowContext::new(flow_id.clone(), client_id, owner, self.services.clone());
    let mut instance: Box<dyn Runnable> = Box::new(FlowInstance::new(flow, ctx));

    let progress = instance.start().await;
    self.advance(flow_id.clone(), instance, progress).await?;
    Ok(flow_id)
  }

  /// Route one delivery to its instance and run the resumed handler.
  ///
  /// A delivery for an unknown instance, an unknown state, or a state the
  /// instance is not awaiting is rejected with a [`RoutingError`] and the
  /// instance is left exactly as it was.
  pub async fn deliver(&mut self, delivery: Delivery) -> Result<(), RuntimeError> {
    let Delivery {
      flow_id,
      state,
      envelope,
    } = delivery;

    let Some(mut instance) = self.instances.remove(&flow_id) else {
      warn!(flow_id = %flow_id, state = %state, "delivery_rejected: no such flow");
      return Err(RoutingError::UnknownInstance(flow_id).into());
    };

    let progress = instance.resume(&state, envelope).await;
    match progress {
      Err(e) if !instance.is_finished() => {
        warn!(flow_id = %flow_id, state = %state, error = %e, "delivery_rejected");
        self.instances.insert(flow_id, instance);
        Err(e)
      }
      progress => self.advance(flow_id, instance, progress).await,
    }
  }

  /// Wait for the next delivery and process it.
  ///
  /// Returns `None` only if the delivery queue has closed, which cannot
  /// happen while the scheduler holds its own sender.
  pub async fn process_next(&mut self) -> Option<Result<(), RuntimeError>> {
    let delivery = self.receiver.recv().await?;
    Some(self.deliver(delivery).await)
  }

  /// Process deliveries until no instance is running.
  ///
  /// Rejected deliveries and failed instances are logged and archived; they
  /// do not stop the loop. Returns [`RuntimeError::Cancelled`] if `cancel`
  /// fires first.
  pub async fn run_until_idle(&mut self, cancel: CancellationToken) -> Result<(), RuntimeError> {
    while !self.instances.is_empty() {
      tokio::select! {
        _ = cancel.cancelled() => {
          warn!(running = self.instances.len(), "scheduler cancelled");
          return Err(RuntimeError::Cancelled);
        }
        // The scheduler holds a sender, so the queue stays open
        Some(delivery) = self.receiver.recv() => {
          if let Err(e) = self.deliver(delivery).await {
            debug!(error = %e, "delivery processed with error");
          }
        }
      }
    }
    Ok(())
  }

  async fn advance(
    &mut self,
    flow_id: FlowId,
    instance: Box<dyn Runnable>,
    progress: Result<Progress, RuntimeError>,
  ) -> Result<(), RuntimeError> {
    match progress {
      Ok(Progress::Suspended { state, call }) => {
        let client_id = instance.client_id().to_string();
        self.instances.insert(flow_id.clone(), instance);
        self.dispatch(flow_id, &client_id, state, call).await;
        Ok(())
      }
      Ok(Progress::Finished) => {
        self.archive(flow_id, instance.as_ref(), OutcomeStatus::Completed);
        Ok(())
      }
      Err(e) => {
        let status = OutcomeStatus::Failed {
          error: e.to_string(),
        };
        self.archive(flow_id, instance.as_ref(), status);
        Err(e)
      }
    }
  }

  async fn dispatch(
    &self,
    flow_id: FlowId,
    client_id: &str,
    state: &'static str,
    call: OutboundCall,
  ) {
    info!(
      flow_id = %flow_id,
      client_id = %client_id,
      call = call.label(),
      reply_state = state,
      "call_dispatched"
    );

    let (responder, reply) = Responder::channel(flow_id.clone(), state);
    let result = match call {
      OutboundCall::Command(descriptor) => self.commands.send(client_id, descriptor, responder).await,
      OutboundCall::SubFlow { name, params } => {
        self
          .subflows
          .invoke(client_id, &name, params, responder)
          .await
      }
    };

    match result {
      Ok(()) => {
        tokio::spawn(forward(
          flow_id,
          state.to_string(),
          reply,
          self.sender.clone(),
        ));
      }
      // Transport failures reach the handler like any other failed call
      Err(e) => {
        warn!(flow_id = %flow_id, error = %e, "call_dispatch_failed");
        let _ = self.sender.send(Delivery {
          flow_id,
          state: state.to_string(),
          envelope: ResponseEnvelope::failed(e.to_string()),
        });
      }
    }
  }

  fn archive(&mut self, flow_id: FlowId, instance: &dyn Runnable, status: OutcomeStatus) {
    let outcome = FlowOutcome {
      flow_id: flow_id.clone(),
      flow: instance.flow_name().to_string(),
      client_id: instance.client_id().to_string(),
      final_state: instance.last_state().map(str::to_string),
      status,
    };
    info!(flow_id = %flow_id, outcome = ?outcome.status, "flow_archived");
    self.outcomes.insert(flow_id, outcome);
  }
}
