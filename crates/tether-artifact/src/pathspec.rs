use serde::{Deserialize, Serialize};

use crate::Urn;

/// A path on a client's operating system.
///
/// Files fetched from a client are mirrored into that client's namespace
/// under `fs/os`, so `/tmp/ss.dat` on client `C.1` lives at
/// `tether:/C.1/fs/os/tmp/ss.dat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pathspec {
  pub path: String,
}

impl Pathspec {
  pub fn os(path: impl Into<String>) -> Self {
    Self { path: path.into() }
  }

  /// Map this path into the namespace rooted at `client`.
  pub fn to_urn(&self, client: &Urn) -> Urn {
    client.join("fs").join("os").join(&self.path)
  }
}
