//! Responses delivered back into a suspended flow.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tether_artifact::Urn;

/// What a single response record carries besides its status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Payload {
  Empty,
  /// Captured output of a remote command.
  Output { stdout: Bytes, stderr: Bytes },
  /// An object a sub-flow stored on the caller's behalf.
  Artifact { urn: Urn },
}

/// One record reported by the remote agent or a sub-flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
  /// Agent-reported exit or status code; `0` means the operation succeeded.
  pub exit_status: i32,
  pub payload: Payload,
}

impl ResponseRecord {
  pub fn output(exit_status: i32, stdout: impl Into<Bytes>, stderr: impl Into<Bytes>) -> Self {
    Self {
      exit_status,
      payload: Payload::Output {
        stdout: stdout.into(),
        stderr: stderr.into(),
      },
    }
  }

  pub fn artifact(urn: Urn) -> Self {
    Self {
      exit_status: 0,
      payload: Payload::Artifact { urn },
    }
  }

  /// The referenced object, if this record carries one.
  pub fn artifact_urn(&self) -> Option<&Urn> {
    match &self.payload {
      Payload::Artifact { urn } => Some(urn),
      _ => None,
    }
  }
}

/// The result of one outbound call, as seen by the state that resumes.
///
/// An unsuccessful envelope covers every way a call can fail to complete:
/// the agent reported an error, the time limit ran out, or the transport
/// could not deliver the call at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
  success: bool,
  records: Vec<ResponseRecord>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

impl ResponseEnvelope {
  /// A successful call with the given records.
  pub fn ok(records: Vec<ResponseRecord>) -> Self {
    Self {
      success: true,
      records,
      error: None,
    }
  }

  /// A failed call.
  pub fn failed(error: impl Into<String>) -> Self {
    Self {
      success: false,
      records: Vec::new(),
      error: Some(error.into()),
    }
  }

  /// A failed call that still produced records.
  pub fn failed_with(error: impl Into<String>, records: Vec<ResponseRecord>) -> Self {
    Self {
      success: false,
      records,
      error: Some(error.into()),
    }
  }

  pub fn success(&self) -> bool {
    self.success
  }

  pub fn records(&self) -> &[ResponseRecord] {
    &self.records
  }

  /// The first record, if any.
  pub fn first(&self) -> Option<&ResponseRecord> {
    self.records.first()
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  /// Short description for error messages.
  pub fn status(&self) -> String {
    match (&self.error, self.first()) {
      (Some(error), _) => error.clone(),
      (None, Some(record)) => format!("exit status {}", record.exit_status),
      (None, None) => "no responses".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_first_and_status() {
    let envelope = ResponseEnvelope::ok(vec![
      ResponseRecord::output(3, "", "boom"),
      ResponseRecord::output(0, "", ""),
    ]);
    assert!(envelope.success());
    assert_eq!(envelope.first().map(|r| r.exit_status), Some(3));
    assert_eq!(envelope.status(), "exit status 3");

    let empty = ResponseEnvelope::ok(vec![]);
    assert!(empty.first().is_none());
    assert_eq!(empty.status(), "no responses");

    let failed = ResponseEnvelope::failed("time limit of 15s exceeded");
    assert!(!failed.success());
    assert_eq!(failed.status(), "time limit of 15s exceeded");
  }

  #[test]
  fn test_artifact_record() {
    let urn = Urn::root().join("C.1/fs/os/tmp/ss.dat");
    let record = ResponseRecord::artifact(urn.clone());
    assert_eq!(record.artifact_urn(), Some(&urn));
    assert_eq!(ResponseRecord::output(0, "", "").artifact_urn(), None);
  }
}
