//! The flow contract: a closed set of states and one handler per state.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;

use crate::command::OutboundCall;
use crate::context::FlowContext;
use crate::envelope::ResponseEnvelope;
use crate::error::{FlowError, RoutingError};

/// The state enum of a flow.
///
/// Each variant names one handler. `next_states` is the whitelist of states
/// a handler may suspend into; it is known before the handler runs and is
/// what incoming responses are routed against.
pub trait FlowState: Copy + Eq + fmt::Debug + Send + Sync + 'static {
  /// The state `start` runs.
  const INITIAL: Self;

  /// The state every successful run ends in. It declares no next states.
  const TERMINAL: Self;

  /// Every state of the flow.
  fn all() -> &'static [Self];

  /// Stable name used to key deliveries.
  fn name(&self) -> &'static str;

  /// States this handler may suspend into.
  fn next_states(&self) -> &'static [Self];

  /// Look a state up by name.
  fn from_name(name: &str) -> Option<Self> {
    Self::all().iter().copied().find(|state| state.name() == name)
  }
}

/// What a handler asks the orchestrator to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<S> {
  /// Issue `call` and suspend until its result is delivered to `next`.
  Call { call: OutboundCall, next: S },
  /// Nothing further from this handler. Unless it was the terminal state,
  /// the terminal handler runs next.
  Done,
}

impl<S> Transition<S> {
  pub fn call(call: OutboundCall, next: S) -> Self {
    Self::Call { call, next }
  }
}

/// Handler result: a transition, or a fatal error that aborts the flow.
pub type StepResult<S> = Result<Transition<S>, FlowError>;

/// A flow kind.
///
/// The implementing type is the flow's instance state: it carries exactly
/// the variables the handlers share across suspensions, and is only mutated
/// from inside [`Flow::step`].
#[async_trait]
pub trait Flow: Send + Sync + 'static {
  type State: FlowState;

  /// Flow name used in logs and outcomes.
  const NAME: &'static str;

  /// Run the handler for `state`.
  ///
  /// `responses` is `None` for the initial and terminal states and `Some`
  /// for every state entered through a delivery.
  async fn step(
    &mut self,
    state: Self::State,
    responses: Option<ResponseEnvelope>,
    ctx: &FlowContext,
  ) -> StepResult<Self::State>;
}

/// Check a flow's state table.
///
/// Names must be unique, the initial and terminal states and every declared
/// next state must be listed in `all()`, and the terminal state must not
/// declare next states.
pub fn validate_states<F: Flow>() -> Result<(), RoutingError> {
  let invalid = |message: String| RoutingError::InvalidStates {
    flow: F::NAME,
    message,
  };
  let all = F::State::all();

  let mut names = HashSet::new();
  for state in all {
    if !names.insert(state.name()) {
      return Err(invalid(format!("duplicate state name '{}'", state.name())));
    }
  }

  for required in [F::State::INITIAL, F::State::TERMINAL] {
    if !all.contains(&required) {
      return Err(invalid(format!("'{}' is not a registered state", required.name())));
    }
  }

  for state in all {
    for next in state.next_states() {
      if !all.contains(next) {
        return Err(invalid(format!(
          "'{}' declares unregistered next state '{}'",
          state.name(),
          next.name()
        )));
      }
    }
  }

  if !F::State::TERMINAL.next_states().is_empty() {
    return Err(invalid(format!(
      "terminal state '{}' declares next states",
      F::State::TERMINAL.name()
    )));
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  enum Good {
    Start,
    Wait,
    End,
  }

  impl FlowState for Good {
    const INITIAL: Self = Self::Start;
    const TERMINAL: Self = Self::End;

    fn all() -> &'static [Self] {
      &[Self::Start, Self::Wait, Self::End]
    }

    fn name(&self) -> &'static str {
      match self {
        Self::Start => "Start",
        Self::Wait => "Wait",
        Self::End => "End",
      }
    }

    fn next_states(&self) -> &'static [Self] {
      match self {
        Self::Start => &[Self::Wait],
        Self::Wait | Self::End => &[],
      }
    }
  }

  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  enum LoopingEnd {
    Start,
    End,
  }

  impl FlowState for LoopingEnd {
    const INITIAL: Self = Self::Start;
    const TERMINAL: Self = Self::End;

    fn all() -> &'static [Self] {
      &[Self::Start, Self::End]
    }

    fn name(&self) -> &'static str {
      match self {
        Self::Start => "Start",
        Self::End => "End",
      }
    }

    fn next_states(&self) -> &'static [Self] {
      &[Self::Start]
    }
  }

  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  enum Unlisted {
    Start,
    Hidden,
    End,
  }

  impl FlowState for Unlisted {
    const INITIAL: Self = Self::Start;
    const TERMINAL: Self = Self::End;

    fn all() -> &'static [Self] {
      &[Self::Start, Self::End]
    }

    fn name(&self) -> &'static str {
      match self {
        Self::Start => "Start",
        Self::Hidden => "Hidden",
        Self::End => "End",
      }
    }

    fn next_states(&self) -> &'static [Self] {
      match self {
        Self::Start => &[Self::Hidden],
        _ => &[],
      }
    }
  }

  struct Probe<S>(std::marker::PhantomData<S>);

  #[async_trait]
  impl<S: FlowState> Flow for Probe<S> {
    type State = S;
    const NAME: &'static str = "Probe";

    async fn step(
      &mut self,
      _state: S,
      _responses: Option<ResponseEnvelope>,
      _ctx: &FlowContext,
    ) -> StepResult<S> {
      Ok(Transition::Done)
    }
  }

  #[test]
  fn test_from_name() {
    assert_eq!(Good::from_name("Wait"), Some(Good::Wait));
    assert_eq!(Good::from_name("wait"), None);
  }

  #[test]
  fn test_valid_table() {
    assert_eq!(validate_states::<Probe<Good>>(), Ok(()));
  }

  #[test]
  fn test_terminal_with_next_states_is_rejected() {
    let err = validate_states::<Probe<LoopingEnd>>().unwrap_err();
    assert!(matches!(err, RoutingError::InvalidStates { .. }));
    assert!(err.to_string().contains("terminal state 'End'"));
  }

  #[test]
  fn test_unregistered_next_state_is_rejected() {
    let err = validate_states::<Probe<Unlisted>>().unwrap_err();
    assert!(err.to_string().contains("unregistered next state 'Hidden'"));
  }
}
