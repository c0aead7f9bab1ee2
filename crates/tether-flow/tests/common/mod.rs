//! Shared test flows and collaborators.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use tether_artifact::MemoryStore;
use tether_flow::{
  ChannelSink, CommandChannel, CommandDescriptor, DispatchError, FixedClock, Flow, FlowContext,
  FlowError, FlowState, LogEntry, Notification, NotificationKind, OutboundCall, Responder,
  ResponseEnvelope, Services, StepResult, SubFlowInvoker, Transition,
};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingState {
  Start,
  Wait,
  Check,
  End,
}

impl FlowState for PingState {
  const INITIAL: Self = Self::Start;
  const TERMINAL: Self = Self::End;

  fn all() -> &'static [Self] {
    &[Self::Start, Self::Wait, Self::Check, Self::End]
  }

  fn name(&self) -> &'static str {
    match self {
      Self::Start => "Start",
      Self::Wait => "Wait",
      Self::Check => "Check",
      Self::End => "End",
    }
  }

  fn next_states(&self) -> &'static [Self] {
    match self {
      Self::Start => &[Self::Wait],
      Self::Wait => &[Self::Check],
      Self::Check | Self::End => &[],
    }
  }
}

/// Start pings the agent, Wait launches a child flow, Check tolerates a
/// failed child, End notifies.
#[derive(Debug, Default)]
pub struct Ping {
  pub fail_on_start: bool,
  pub visited: Vec<PingState>,
}

#[async_trait]
impl Flow for Ping {
  type State = PingState;
  const NAME: &'static str = "Ping";

  async fn step(
    &mut self,
    state: PingState,
    responses: Option<ResponseEnvelope>,
    ctx: &FlowContext,
  ) -> StepResult<PingState> {
    self.visited.push(state);
    match state {
      PingState::Start => {
        if self.fail_on_start {
          return Err(FlowError::abort("refusing to start"));
        }
        let cmd = CommandDescriptor::new("/bin/echo", ["ping"], Duration::from_secs(5));
        Ok(Transition::call(OutboundCall::Command(cmd), PingState::Wait))
      }
      PingState::Wait => {
        let responses = responses.ok_or(FlowError::MissingResponses { state: "Wait" })?;
        if !responses.success() {
          return Err(FlowError::abort(format!("ping failed: {}", responses.status())));
        }
        Ok(Transition::call(
          OutboundCall::SubFlow {
            name: "Child".to_string(),
            params: json!({ "n": 1 }),
          },
          PingState::Check,
        ))
      }
      PingState::Check => {
        let responses = responses.ok_or(FlowError::MissingResponses { state: "Check" })?;
        if !responses.success() {
          ctx.log("child flow failed");
        }
        Ok(Transition::Done)
      }
      PingState::End => {
        ctx.notify(NotificationKind::ViewObject, ctx.client_urn(), "pinged");
        Ok(Transition::Done)
      }
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RogueState {
  Start,
  Middle,
  End,
}

impl FlowState for RogueState {
  const INITIAL: Self = Self::Start;
  const TERMINAL: Self = Self::End;

  fn all() -> &'static [Self] {
    &[Self::Start, Self::Middle, Self::End]
  }

  fn name(&self) -> &'static str {
    match self {
      Self::Start => "Start",
      Self::Middle => "Middle",
      Self::End => "End",
    }
  }

  fn next_states(&self) -> &'static [Self] {
    match self {
      Self::Start => &[Self::Middle],
      _ => &[],
    }
  }
}

/// Suspends into a state its initial handler never declared.
pub struct Rogue;

#[async_trait]
impl Flow for Rogue {
  type State = RogueState;
  const NAME: &'static str = "Rogue";

  async fn step(
    &mut self,
    _state: RogueState,
    _responses: Option<ResponseEnvelope>,
    _ctx: &FlowContext,
  ) -> StepResult<RogueState> {
    let cmd = CommandDescriptor::new("/bin/true", Vec::<String>::new(), Duration::from_secs(1));
    Ok(Transition::call(OutboundCall::Command(cmd), RogueState::End))
  }
}

pub struct Harness {
  pub services: Services,
  pub store: Arc<MemoryStore>,
  pub notifications: mpsc::UnboundedReceiver<Notification>,
  pub logs: mpsc::UnboundedReceiver<LogEntry>,
}

pub fn harness() -> Harness {
  let store = Arc::new(MemoryStore::new());
  let (notifier, notifications) = ChannelSink::<Notification>::channel();
  let (log, logs) = ChannelSink::<LogEntry>::channel();
  let services = Services {
    store: store.clone(),
    notifier: Arc::new(notifier),
    log: Arc::new(log),
    clock: Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 5).unwrap())),
  };
  Harness {
    services,
    store,
    notifications,
    logs,
  }
}

/// A command channel that holds on to every call until the test answers it.
#[derive(Default)]
pub struct HeldChannel {
  pub calls: Mutex<Vec<(String, CommandDescriptor, Responder)>>,
  pub refuse: bool,
}

impl HeldChannel {
  pub fn pending(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  pub fn take(&self) -> (String, CommandDescriptor, Responder) {
    self.calls.lock().unwrap().remove(0)
  }
}

#[async_trait]
impl CommandChannel for HeldChannel {
  async fn send(
    &self,
    client_id: &str,
    descriptor: CommandDescriptor,
    responder: Responder,
  ) -> Result<(), DispatchError> {
    if self.refuse {
      return Err(DispatchError::Unavailable("agent offline".to_string()));
    }
    self
      .calls
      .lock()
      .unwrap()
      .push((client_id.to_string(), descriptor, responder));
    Ok(())
  }
}

/// A sub-flow invoker that holds on to every call until the test answers it.
#[derive(Default)]
pub struct HeldInvoker {
  pub calls: Mutex<Vec<(String, String, serde_json::Value, Responder)>>,
}

impl HeldInvoker {
  pub fn pending(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  pub fn take(&self) -> (String, String, serde_json::Value, Responder) {
    self.calls.lock().unwrap().remove(0)
  }
}

#[async_trait]
impl SubFlowInvoker for HeldInvoker {
  async fn invoke(
    &self,
    client_id: &str,
    name: &str,
    params: serde_json::Value,
    responder: Responder,
  ) -> Result<(), DispatchError> {
    self.calls.lock().unwrap().push((
      client_id.to_string(),
      name.to_string(),
      params,
      responder,
    ));
    Ok(())
  }
}

/// Answers every call immediately with the given envelope.
pub struct EchoChannel(pub ResponseEnvelope);

#[async_trait]
impl CommandChannel for EchoChannel {
  async fn send(
    &self,
    _client_id: &str,
    _descriptor: CommandDescriptor,
    responder: Responder,
  ) -> Result<(), DispatchError> {
    responder.respond(self.0.clone());
    Ok(())
  }
}

#[async_trait]
impl SubFlowInvoker for EchoChannel {
  async fn invoke(
    &self,
    _client_id: &str,
    _name: &str,
    _params: serde_json::Value,
    responder: Responder,
  ) -> Result<(), DispatchError> {
    responder.respond(self.0.clone());
    Ok(())
  }
}
