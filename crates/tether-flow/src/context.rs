//! Per-instance identity and access to shared collaborators.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tether_artifact::{ArtifactStore, Urn};

use crate::sink::{FlowLog, LogEntry, Notification, NotificationKind, Notifier};

/// Unique id of one flow instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(String);

impl FlowId {
  pub fn new() -> Self {
    Self(uuid::Uuid::new_v4().to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Default for FlowId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for FlowId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for FlowId {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    self.0
  }
}

/// Collaborators shared by every instance a scheduler runs.
#[derive(Clone)]
pub struct Services {
  pub store: Arc<dyn ArtifactStore>,
  pub notifier: Arc<dyn Notifier>,
  pub log: Arc<dyn FlowLog>,
  pub clock: Arc<dyn Clock>,
}

/// What a handler sees of the world.
///
/// Each instance owns its context. The artifact namespace of an instance is
/// rooted at its client (`tether:/<client_id>`), so instances for different
/// clients never write to the same identifiers.
#[derive(Clone)]
pub struct FlowContext {
  flow_id: FlowId,
  client_id: String,
  owner: String,
  services: Services,
}

impl FlowContext {
  pub fn new(
    flow_id: FlowId,
    client_id: impl Into<String>,
    owner: impl Into<String>,
    services: Services,
  ) -> Self {
    Self {
      flow_id,
      client_id: client_id.into(),
      owner: owner.into(),
      services,
    }
  }

  pub fn flow_id(&self) -> &FlowId {
    &self.flow_id
  }

  pub fn client_id(&self) -> &str {
    &self.client_id
  }

  /// The principal that started the flow.
  pub fn owner(&self) -> &str {
    &self.owner
  }

  /// Root of this instance's artifact namespace.
  pub fn client_urn(&self) -> Urn {
    Urn::root().join(&self.client_id)
  }

  pub fn store(&self) -> &dyn ArtifactStore {
    self.services.store.as_ref()
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.services.clock.now()
  }

  /// Record a tolerated failure in the flow log.
  pub fn log(&self, message: impl Into<String>) {
    self.services.log.log(LogEntry {
      flow_id: self.flow_id.clone(),
      timestamp: self.now(),
      message: message.into(),
    });
  }

  /// Notify the owner about `reference`.
  pub fn notify(&self, kind: NotificationKind, reference: Urn, message: impl Into<String>) {
    self.services.notifier.notify(Notification {
      flow_id: self.flow_id.clone(),
      owner: self.owner.clone(),
      kind,
      reference,
      message: message.into(),
    });
  }
}
