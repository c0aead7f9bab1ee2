//! Notification and flow-log sinks.
//!
//! Both are fire-and-forget: a flow never waits for, or fails because of, a
//! sink. They are distinct from diagnostic `tracing` output: notifications
//! are addressed to the flow's owner, log entries are the flow's own record
//! of tolerated failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tether_artifact::Urn;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::context::FlowId;

/// What the owner is being pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
  /// A newly created object worth viewing.
  ViewObject,
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub flow_id: FlowId,
  pub owner: String,
  pub kind: NotificationKind,
  pub reference: Urn,
  pub message: String,
}

/// A flow log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
  pub flow_id: FlowId,
  pub timestamp: DateTime<Utc>,
  pub message: String,
}

/// Receives notifications.
pub trait Notifier: Send + Sync {
  fn notify(&self, notification: Notification);
}

/// Receives flow log entries.
pub trait FlowLog: Send + Sync {
  fn log(&self, entry: LogEntry);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl Notifier for NoopSink {
  fn notify(&self, _notification: Notification) {}
}

impl FlowLog for NoopSink {
  fn log(&self, _entry: LogEntry) {}
}

/// A sink that forwards to an unbounded channel.
///
/// Use this to consume notifications or log entries elsewhere (persist them,
/// stream them to a UI, assert on them in tests).
#[derive(Debug, Clone)]
pub struct ChannelSink<T> {
  sender: mpsc::UnboundedSender<T>,
}

impl<T> ChannelSink<T> {
  pub fn new(sender: mpsc::UnboundedSender<T>) -> Self {
    Self { sender }
  }

  /// Create a sink together with its receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<T>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl Notifier for ChannelSink<Notification> {
  fn notify(&self, notification: Notification) {
    // Receiver may have been dropped
    let _ = self.sender.send(notification);
  }
}

impl FlowLog for ChannelSink<LogEntry> {
  fn log(&self, entry: LogEntry) {
    let _ = self.sender.send(entry);
  }
}

/// A sink that emits everything as `tracing` events.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl Notifier for TracingSink {
  fn notify(&self, notification: Notification) {
    info!(
      flow_id = %notification.flow_id,
      owner = %notification.owner,
      kind = ?notification.kind,
      reference = %notification.reference,
      "{}",
      notification.message
    );
  }
}

impl FlowLog for TracingSink {
  fn log(&self, entry: LogEntry) {
    warn!(flow_id = %entry.flow_id, "{}", entry.message);
  }
}
