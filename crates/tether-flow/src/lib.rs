//! Tether Flow
//!
//! This crate provides the continuation-based state machine that drives a
//! remote agent through a sequence of operations.
//!
//! A [`Flow`] is a closed enum of states plus one handler per state. A
//! handler runs to completion and then either issues exactly one outbound
//! call (a remote command or a sub-flow) and names the state that resumes
//! with its result, or finishes. Handlers never wait; the instance simply
//! has nothing runnable until the matching [`Delivery`] arrives.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//! ├── start(flow, client, owner) - creates a FlowInstance, runs INITIAL
//! ├── deliver(delivery)          - routes (flow_id, state) → FlowInstance::resume
//! └── run_until_idle(cancel)     - drains the delivery queue
//!
//! FlowInstance
//! ├── start()                    - Created → Waiting(next) | Completed | Failed
//! └── resume(state, responses)   - rejects anything but the awaited state
//!
//! CommandChannel / SubFlowInvoker
//! └── carry OutboundCalls, answer through a Responder
//! ```
//!
//! Error policy is per handler: returning a [`FlowError`] aborts the flow,
//! while a tolerated failure is recorded with [`FlowContext::log`] and the
//! handler carries on.

mod command;
mod context;
mod dispatch;
mod envelope;
mod error;
mod flow;
mod instance;
mod scheduler;
mod sink;

pub use command::{CommandDescriptor, OutboundCall};
pub use context::{Clock, FixedClock, FlowContext, FlowId, Services, SystemClock};
pub use dispatch::{CommandChannel, Delivery, RESPONDER_DROPPED, Responder, SubFlowInvoker};
pub use envelope::{Payload, ResponseEnvelope, ResponseRecord};
pub use error::{DispatchError, FlowError, RoutingError, RuntimeError};
pub use flow::{Flow, FlowState, StepResult, Transition, validate_states};
pub use instance::{FlowInstance, FlowStatus, Progress};
pub use scheduler::{FlowOutcome, OutcomeStatus, Scheduler};
pub use sink::{
  ChannelSink, FlowLog, LogEntry, NoopSink, Notification, NotificationKind, Notifier, TracingSink,
};
