//! Tether Artifact
//!
//! This crate provides the artifact store used by tether flows. Every object
//! in the store is addressed by a hierarchical [`Urn`] rooted at the client
//! it belongs to (`tether:/C.1234/analysis/screencaps/...`) and carries a
//! kind, a set of string attributes and an opaque byte payload.
//!
//! The [`ArtifactStore`] trait is the backend layer. Objects are write-once:
//! [`ArtifactStore::create`] hands out an [`ArtifactWriter`], the caller writes
//! the full content and [`ArtifactStore::close`] commits it. Reads go through
//! [`ArtifactStore::open`], which returns an [`ArtifactReader`] snapshot.
//!
//! Two backends are provided:
//! - [`MemoryStore`] keeps everything in memory (tests, embedding).
//! - [`FsStore`] persists objects below a base directory.

mod fs;
mod memory;
mod object;
mod pathspec;
mod urn;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use object::{ArtifactKind, ArtifactReader, ArtifactWriter};
pub use pathspec::Pathspec;
pub use urn::Urn;

use async_trait::async_trait;

/// Well-known attribute names on client snapshot objects.
pub mod attributes {
  /// Hostname reported by the client.
  pub const HOSTNAME: &str = "hostname";
  /// Operating system family reported by the client (`Darwin`, `Linux`, ...).
  pub const SYSTEM: &str = "system";
  /// Client-side path a fetched file was read from.
  pub const PATH: &str = "path";
}

/// Error type for artifact store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested object was not found.
  #[error("artifact not found: {0}")]
  NotFound(Urn),

  /// An object already exists at this identifier.
  #[error("artifact already exists: {0}")]
  AlreadyExists(Urn),

  /// The identifier could not be parsed.
  #[error("invalid urn '{0}'")]
  InvalidUrn(String),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Object metadata could not be encoded or decoded.
  #[error("invalid artifact metadata: {0}")]
  Metadata(#[from] serde_json::Error),
}

/// Artifact store trait.
///
/// Implementations own the physical layout; callers only ever deal in URNs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
  /// Open an existing object for reading.
  async fn open(&self, urn: &Urn) -> Result<ArtifactReader, Error>;

  /// Reserve a new object for writing.
  ///
  /// Fails with [`Error::AlreadyExists`] if an object is already stored at
  /// `urn`. Nothing is visible to readers until [`ArtifactStore::close`].
  async fn create(&self, urn: &Urn, kind: ArtifactKind) -> Result<ArtifactWriter, Error>;

  /// Commit a writer's content and attributes.
  async fn close(&self, writer: ArtifactWriter) -> Result<(), Error>;

  /// Delete an object. Children of `urn` are left in place.
  async fn delete(&self, urn: &Urn) -> Result<(), Error>;

  /// List the direct children of `urn`, in lexical order.
  async fn list_children(&self, urn: &Urn) -> Result<Vec<Urn>, Error>;
}
