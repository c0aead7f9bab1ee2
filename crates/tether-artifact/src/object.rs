//! Object handles handed out by a store.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Urn;

/// What an object represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
  /// Snapshot of a client (hostname, system, ...).
  Client,
  /// A file retrieved from, or produced about, a client.
  File,
}

/// A read handle over a committed object.
///
/// The handle is a snapshot: later writes to the store are not observed.
/// Reads advance an internal cursor, so successive `read` calls return
/// consecutive chunks of the content.
#[derive(Debug, Clone)]
pub struct ArtifactReader {
  urn: Urn,
  kind: ArtifactKind,
  attributes: BTreeMap<String, String>,
  created_at: DateTime<Utc>,
  content: Bytes,
  offset: usize,
}

impl ArtifactReader {
  pub(crate) fn new(
    urn: Urn,
    kind: ArtifactKind,
    attributes: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
    content: Bytes,
  ) -> Self {
    Self {
      urn,
      kind,
      attributes,
      created_at,
      content,
      offset: 0,
    }
  }

  pub fn urn(&self) -> &Urn {
    &self.urn
  }

  pub fn kind(&self) -> ArtifactKind {
    self.kind
  }

  /// Look up an attribute by name.
  pub fn attribute(&self, name: &str) -> Option<&str> {
    self.attributes.get(name).map(String::as_str)
  }

  pub fn attributes(&self) -> &BTreeMap<String, String> {
    &self.attributes
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  /// Total content length in bytes.
  pub fn len(&self) -> usize {
    self.content.len()
  }

  pub fn is_empty(&self) -> bool {
    self.content.is_empty()
  }

  /// Read up to `max_bytes` from the current position.
  ///
  /// Returns an empty buffer once the content is exhausted.
  pub fn read(&mut self, max_bytes: usize) -> Bytes {
    let end = self.offset.saturating_add(max_bytes).min(self.content.len());
    let chunk = self.content.slice(self.offset..end);
    self.offset = end;
    chunk
  }
}

/// A write handle for an object that has been reserved but not committed.
#[derive(Debug)]
pub struct ArtifactWriter {
  urn: Urn,
  kind: ArtifactKind,
  attributes: BTreeMap<String, String>,
  content: BytesMut,
}

impl ArtifactWriter {
  pub(crate) fn new(urn: Urn, kind: ArtifactKind) -> Self {
    Self {
      urn,
      kind,
      attributes: BTreeMap::new(),
      content: BytesMut::new(),
    }
  }

  pub fn urn(&self) -> &Urn {
    &self.urn
  }

  pub fn kind(&self) -> ArtifactKind {
    self.kind
  }

  /// Set an attribute, replacing any previous value.
  pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
    self.attributes.insert(name.into(), value.into());
  }

  /// Append bytes to the pending content.
  pub fn write(&mut self, data: &[u8]) {
    self.content.extend_from_slice(data);
  }

  pub fn len(&self) -> usize {
    self.content.len()
  }

  pub fn is_empty(&self) -> bool {
    self.content.is_empty()
  }

  pub(crate) fn into_parts(self) -> (Urn, ArtifactKind, BTreeMap<String, String>, Bytes) {
    (self.urn, self.kind, self.attributes, self.content.freeze())
  }
}
