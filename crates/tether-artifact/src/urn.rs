//! Hierarchical object identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

const SCHEME: &str = "tether:";

/// A hierarchical identifier: an ordered list of path segments below the
/// store root.
///
/// Segments never contain `/` and are never `.` or `..`, so a URN always maps
/// onto a path below a store's base directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Urn {
  segments: Vec<String>,
}

impl Urn {
  /// The store root (`tether:/`).
  pub fn root() -> Self {
    Self {
      segments: Vec::new(),
    }
  }

  /// Parse a URN, with or without the `tether:` scheme.
  pub fn parse(value: &str) -> Result<Self, Error> {
    let path = value.strip_prefix(SCHEME).unwrap_or(value);
    if !path.starts_with('/') && !path.is_empty() && value.starts_with(SCHEME) {
      return Err(Error::InvalidUrn(value.to_string()));
    }

    let mut segments = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
      if segment == "." || segment == ".." {
        return Err(Error::InvalidUrn(value.to_string()));
      }
      segments.push(segment.to_string());
    }
    Ok(Self { segments })
  }

  /// Return a new URN with `path` appended.
  ///
  /// `path` may contain several `/`-separated segments; empty, `.` and `..`
  /// segments are dropped.
  pub fn join(&self, path: impl AsRef<str>) -> Self {
    let mut segments = self.segments.clone();
    segments.extend(
      path
        .as_ref()
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(str::to_string),
    );
    Self { segments }
  }

  /// The path segments below the root.
  pub fn segments(&self) -> &[String] {
    &self.segments
  }

  /// The last segment, or `None` for the root.
  pub fn basename(&self) -> Option<&str> {
    self.segments.last().map(String::as_str)
  }

  /// The parent URN, or `None` for the root.
  pub fn parent(&self) -> Option<Self> {
    if self.segments.is_empty() {
      return None;
    }
    Some(Self {
      segments: self.segments[..self.segments.len() - 1].to_vec(),
    })
  }

  /// Whether `self` equals `other` or lives below it.
  pub fn starts_with(&self, other: &Urn) -> bool {
    self.segments.starts_with(&other.segments)
  }

  pub fn is_root(&self) -> bool {
    self.segments.is_empty()
  }
}

impl fmt::Display for Urn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", SCHEME, self.segments.join("/"))
  }
}

impl From<Urn> for String {
  fn from(urn: Urn) -> Self {
    urn.to_string()
  }
}

impl TryFrom<String> for Urn {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Urn::parse(&value)
  }
}

impl std::str::FromStr for Urn {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Urn::parse(s)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_join_and_display() {
    let urn = Urn::root()
      .join("C.1000")
      .join("analysis")
      .join("screencaps")
      .join("host.screencap.Mon Oct 19 12:00:05 2026");

    assert_eq!(
      urn.to_string(),
      "tether:/C.1000/analysis/screencaps/host.screencap.Mon Oct 19 12:00:05 2026"
    );
    assert_eq!(urn.segments().len(), 4);
    assert_eq!(urn.basename(), Some("host.screencap.Mon Oct 19 12:00:05 2026"));
  }

  #[test]
  fn test_join_splits_and_drops_traversal() {
    let urn = Urn::root().join("C.1").join("fs/os//tmp/../ss.dat");
    assert_eq!(urn.segments(), ["C.1", "fs", "os", "tmp", "ss.dat"]);
  }

  #[test]
  fn test_parse_round_trips_display() {
    let urn = Urn::root().join("C.1/fs/os/tmp/ss.dat");
    let parsed = Urn::parse(&urn.to_string()).unwrap();
    assert_eq!(parsed, urn);

    let bare = Urn::parse("C.1/fs").unwrap();
    assert_eq!(bare, Urn::root().join("C.1").join("fs"));
  }

  #[test]
  fn test_parse_rejects_traversal() {
    assert!(matches!(
      Urn::parse("tether:/C.1/../etc"),
      Err(Error::InvalidUrn(_))
    ));
  }

  #[test]
  fn test_root_and_parent() {
    let root = Urn::root();
    assert!(root.is_root());
    assert_eq!(root.to_string(), "tether:/");
    assert_eq!(root.parent(), None);

    let child = root.join("C.1").join("analysis");
    assert_eq!(child.parent(), Some(root.join("C.1")));
    assert!(child.starts_with(&root.join("C.1")));
    assert!(!root.join("C.1").starts_with(&child));
  }

  #[test]
  fn test_serde_as_string() {
    let urn = Urn::root().join("C.1/analysis");
    let json = serde_json::to_string(&urn).unwrap();
    assert_eq!(json, "\"tether:/C.1/analysis\"");
    let back: Urn = serde_json::from_str(&json).unwrap();
    assert_eq!(back, urn);
  }
}
