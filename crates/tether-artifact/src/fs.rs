use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{ArtifactKind, ArtifactReader, ArtifactStore, ArtifactWriter, Error, Urn};

const CONTENT_FILE: &str = ".content";
const META_FILE: &str = ".meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct ObjectMeta {
  kind: ArtifactKind,
  attributes: BTreeMap<String, String>,
  size: usize,
  created_at: DateTime<Utc>,
}

/// Filesystem-based artifact store.
///
/// Every URN maps to a directory `{base_path}/{segments...}`. An object's
/// content and metadata live in `.content` and `.meta.json` inside that
/// directory, so an object can have children (a client snapshot and the
/// `analysis/` tree below it share a prefix).
///
/// Segments starting with `.` are stored with one extra leading `.`, so no
/// child directory can collide with those two files.
pub struct FsStore {
  base_path: PathBuf,
}

impl FsStore {
  /// Create a new filesystem store with the given base path.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  fn urn_to_dir(&self, urn: &Urn) -> PathBuf {
    urn
      .segments()
      .iter()
      .fold(self.base_path.clone(), |path, segment| {
        path.join(segment_to_dir(segment))
      })
  }

  async fn exists(&self, urn: &Urn) -> Result<bool, Error> {
    Ok(fs::try_exists(self.urn_to_dir(urn).join(META_FILE)).await?)
  }
}

fn segment_to_dir(segment: &str) -> String {
  if segment.starts_with('.') {
    format!(".{}", segment)
  } else {
    segment.to_string()
  }
}

/// Inverse of [`segment_to_dir`]; `None` for entries that are not children.
fn dir_to_segment(name: &str) -> Option<&str> {
  match name.strip_prefix('.') {
    Some(escaped) if escaped.starts_with('.') => Some(escaped),
    Some(_) => None,
    None => Some(name),
  }
}

fn not_found(urn: &Urn) -> impl FnOnce(std::io::Error) -> Error + '_ {
  move |e| {
    if e.kind() == std::io::ErrorKind::NotFound {
      Error::NotFound(urn.clone())
    } else {
      Error::Io(e)
    }
  }
}

#[async_trait]
impl ArtifactStore for FsStore {
  async fn open(&self, urn: &Urn) -> Result<ArtifactReader, Error> {
    let dir = self.urn_to_dir(urn);
    let meta = fs::read(dir.join(META_FILE)).await.map_err(not_found(urn))?;
    let meta: ObjectMeta = serde_json::from_slice(&meta)?;
    let content = fs::read(dir.join(CONTENT_FILE))
      .await
      .map_err(not_found(urn))?;

    Ok(ArtifactReader::new(
      urn.clone(),
      meta.kind,
      meta.attributes,
      meta.created_at,
      Bytes::from(content),
    ))
  }

  async fn create(&self, urn: &Urn, kind: ArtifactKind) -> Result<ArtifactWriter, Error> {
    if self.exists(urn).await? {
      return Err(Error::AlreadyExists(urn.clone()));
    }
    Ok(ArtifactWriter::new(urn.clone(), kind))
  }

  async fn close(&self, writer: ArtifactWriter) -> Result<(), Error> {
    let (urn, kind, attributes, content) = writer.into_parts();
    if self.exists(&urn).await? {
      return Err(Error::AlreadyExists(urn));
    }

    let dir = self.urn_to_dir(&urn);
    fs::create_dir_all(&dir).await?;

    let mut file = File::create(dir.join(CONTENT_FILE)).await?;
    file.write_all(&content).await?;
    file.flush().await?;

    // Metadata goes last: its presence is what marks the object as committed.
    let meta = ObjectMeta {
      kind,
      attributes,
      size: content.len(),
      created_at: Utc::now(),
    };
    fs::write(dir.join(META_FILE), serde_json::to_vec_pretty(&meta)?).await?;

    debug!(urn = %urn, size = content.len(), "artifact_committed");
    Ok(())
  }

  async fn delete(&self, urn: &Urn) -> Result<(), Error> {
    let dir = self.urn_to_dir(urn);
    fs::remove_file(dir.join(META_FILE))
      .await
      .map_err(not_found(urn))?;
    match fs::remove_file(dir.join(CONTENT_FILE)).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(Error::Io(e)),
    }
  }

  async fn list_children(&self, urn: &Urn) -> Result<Vec<Urn>, Error> {
    let mut entries = match fs::read_dir(self.urn_to_dir(urn)).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(Error::Io(e)),
    };

    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      if !entry.file_type().await?.is_dir() {
        continue;
      }
      if let Some(segment) = entry.file_name().to_str().and_then(dir_to_segment) {
        children.push(urn.join(segment));
      }
    }
    children.sort();
    Ok(children)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn put(store: &FsStore, urn: &Urn, data: &[u8]) {
    let mut writer = store.create(urn, ArtifactKind::File).await.unwrap();
    writer.write(data);
    store.close(writer).await.unwrap();
  }

  #[tokio::test]
  async fn test_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let urn = Urn::root().join("C.1");

    let mut writer = store.create(&urn, ArtifactKind::Client).await.unwrap();
    writer.set_attribute("hostname", "host1");
    writer.set_attribute("system", "Darwin");
    store.close(writer).await.unwrap();

    // A fresh store over the same directory sees the object
    let reopened = FsStore::new(dir.path());
    let reader = reopened.open(&urn).await.unwrap();
    assert_eq!(reader.kind(), ArtifactKind::Client);
    assert_eq!(reader.attribute("hostname"), Some("host1"));
    assert_eq!(reader.attribute("system"), Some("Darwin"));
    assert!(reader.is_empty());
  }

  #[tokio::test]
  async fn test_object_with_children() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let client = Urn::root().join("C.1");
    put(&store, &client, b"").await;
    put(&store, &client.join("analysis/screencaps/host.screencap.now"), b"\xFF\xD8").await;

    let mut reader = store
      .open(&client.join("analysis/screencaps/host.screencap.now"))
      .await
      .unwrap();
    assert_eq!(&reader.read(10)[..], b"\xFF\xD8");

    let children = store.list_children(&client).await.unwrap();
    assert_eq!(children, vec![client.join("analysis")]);
  }

  #[tokio::test]
  async fn test_write_once_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let urn = Urn::root().join("C.1/fs/os/tmp/ss.dat");
    put(&store, &urn, b"one").await;

    assert!(matches!(
      store.create(&urn, ArtifactKind::File).await,
      Err(Error::AlreadyExists(_))
    ));

    store.delete(&urn).await.unwrap();
    put(&store, &urn, b"two").await;
    let mut reader = store.open(&urn).await.unwrap();
    assert_eq!(&reader.read(10)[..], b"two");
  }

  #[tokio::test]
  async fn test_dot_segments_do_not_collide_with_object_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let parent = Urn::root().join("C.1/fs/os/tmp");
    put(&store, &parent, b"parent").await;
    put(&store, &parent.join(".content"), b"child").await;
    put(&store, &parent.join(".meta.json"), b"{}").await;

    let mut reader = store.open(&parent).await.unwrap();
    assert_eq!(&reader.read(10)[..], b"parent");
    let mut reader = store.open(&parent.join(".content")).await.unwrap();
    assert_eq!(&reader.read(10)[..], b"child");
    let mut reader = store.open(&parent.join(".meta.json")).await.unwrap();
    assert_eq!(&reader.read(10)[..], b"{}");

    let children = store.list_children(&parent).await.unwrap();
    assert_eq!(
      children,
      vec![parent.join(".content"), parent.join(".meta.json")]
    );

    store.delete(&parent.join(".content")).await.unwrap();
    let mut reader = store.open(&parent).await.unwrap();
    assert_eq!(&reader.read(10)[..], b"parent");
  }

  #[test]
  fn test_segment_escaping_round_trips() {
    for segment in ["ss.dat", ".content", ".meta.json", "..hidden", ".x"] {
      let dir = segment_to_dir(segment);
      assert_ne!(dir, CONTENT_FILE);
      assert_ne!(dir, META_FILE);
      assert_eq!(dir_to_segment(&dir), Some(segment));
    }
    assert_eq!(dir_to_segment(CONTENT_FILE), None);
    assert_eq!(dir_to_segment(META_FILE), None);
  }

  #[tokio::test]
  async fn test_missing_objects() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let urn = Urn::root().join("C.404");

    assert!(matches!(store.open(&urn).await, Err(Error::NotFound(_))));
    assert!(matches!(store.delete(&urn).await, Err(Error::NotFound(_))));
    assert!(store.list_children(&urn).await.unwrap().is_empty());
  }
}
