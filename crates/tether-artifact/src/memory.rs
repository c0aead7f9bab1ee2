use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{ArtifactKind, ArtifactReader, ArtifactStore, ArtifactWriter, Error, Urn};

#[derive(Debug, Clone)]
struct StoredObject {
  kind: ArtifactKind,
  attributes: BTreeMap<String, String>,
  created_at: DateTime<Utc>,
  content: Bytes,
}

/// In-memory artifact store.
#[derive(Debug, Default)]
pub struct MemoryStore {
  objects: RwLock<BTreeMap<Urn, StoredObject>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of committed objects.
  pub async fn len(&self) -> usize {
    self.objects.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.objects.read().await.is_empty()
  }

  /// All committed identifiers equal to or below `prefix`.
  pub async fn urns_under(&self, prefix: &Urn) -> Vec<Urn> {
    self
      .objects
      .read()
      .await
      .keys()
      .filter(|urn| urn.starts_with(prefix))
      .cloned()
      .collect()
  }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
  async fn open(&self, urn: &Urn) -> Result<ArtifactReader, Error> {
    let objects = self.objects.read().await;
    let object = objects
      .get(urn)
      .ok_or_else(|| Error::NotFound(urn.clone()))?;
    Ok(ArtifactReader::new(
      urn.clone(),
      object.kind,
      object.attributes.clone(),
      object.created_at,
      object.content.clone(),
    ))
  }

  async fn create(&self, urn: &Urn, kind: ArtifactKind) -> Result<ArtifactWriter, Error> {
    if self.objects.read().await.contains_key(urn) {
      return Err(Error::AlreadyExists(urn.clone()));
    }
    Ok(ArtifactWriter::new(urn.clone(), kind))
  }

  async fn close(&self, writer: ArtifactWriter) -> Result<(), Error> {
    let (urn, kind, attributes, content) = writer.into_parts();
    let mut objects = self.objects.write().await;
    if objects.contains_key(&urn) {
      return Err(Error::AlreadyExists(urn));
    }
    objects.insert(
      urn,
      StoredObject {
        kind,
        attributes,
        created_at: Utc::now(),
        content,
      },
    );
    Ok(())
  }

  async fn delete(&self, urn: &Urn) -> Result<(), Error> {
    self
      .objects
      .write()
      .await
      .remove(urn)
      .map(|_| ())
      .ok_or_else(|| Error::NotFound(urn.clone()))
  }

  async fn list_children(&self, urn: &Urn) -> Result<Vec<Urn>, Error> {
    let depth = urn.segments().len();
    let children: BTreeSet<Urn> = self
      .objects
      .read()
      .await
      .keys()
      .filter(|key| key.segments().len() > depth && key.starts_with(urn))
      .map(|key| urn.join(&key.segments()[depth]))
      .collect();
    Ok(children.into_iter().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn put(store: &MemoryStore, urn: &Urn, data: &[u8]) {
    let mut writer = store.create(urn, ArtifactKind::File).await.unwrap();
    writer.write(data);
    store.close(writer).await.unwrap();
  }

  #[tokio::test]
  async fn test_create_close_open() {
    let store = MemoryStore::new();
    let urn = Urn::root().join("C.1/analysis/file");

    let mut writer = store.create(&urn, ArtifactKind::File).await.unwrap();
    writer.set_attribute("path", "/tmp/ss.dat");
    writer.write(b"\xFF\xD8\xFF");

    // Not visible until closed
    assert!(matches!(store.open(&urn).await, Err(Error::NotFound(_))));

    store.close(writer).await.unwrap();

    let mut reader = store.open(&urn).await.unwrap();
    assert_eq!(reader.kind(), ArtifactKind::File);
    assert_eq!(reader.attribute("path"), Some("/tmp/ss.dat"));
    assert_eq!(&reader.read(100)[..], b"\xFF\xD8\xFF");
  }

  #[tokio::test]
  async fn test_objects_are_write_once() {
    let store = MemoryStore::new();
    let urn = Urn::root().join("C.1/file");
    put(&store, &urn, b"first").await;

    assert!(matches!(
      store.create(&urn, ArtifactKind::File).await,
      Err(Error::AlreadyExists(_))
    ));
  }

  #[tokio::test]
  async fn test_second_close_on_same_urn_fails() {
    let store = MemoryStore::new();
    let urn = Urn::root().join("C.1/file");

    let first = store.create(&urn, ArtifactKind::File).await.unwrap();
    let second = store.create(&urn, ArtifactKind::File).await.unwrap();
    store.close(first).await.unwrap();

    assert!(matches!(
      store.close(second).await,
      Err(Error::AlreadyExists(_))
    ));
  }

  #[tokio::test]
  async fn test_delete() {
    let store = MemoryStore::new();
    let urn = Urn::root().join("C.1/file");
    put(&store, &urn, b"data").await;

    store.delete(&urn).await.unwrap();
    assert!(store.is_empty().await);
    assert!(matches!(store.delete(&urn).await, Err(Error::NotFound(_))));
  }

  #[tokio::test]
  async fn test_list_children_includes_intermediate_segments() {
    let store = MemoryStore::new();
    let client = Urn::root().join("C.1");
    put(&store, &client, b"").await;
    put(&store, &client.join("analysis/screencaps/a"), b"a").await;
    put(&store, &client.join("analysis/screencaps/b"), b"b").await;
    put(&store, &client.join("fs/os/tmp/ss.dat"), b"c").await;

    let children = store.list_children(&client).await.unwrap();
    assert_eq!(children, vec![client.join("analysis"), client.join("fs")]);

    let caps = store
      .list_children(&client.join("analysis/screencaps"))
      .await
      .unwrap();
    assert_eq!(caps.len(), 2);
    assert_eq!(store.urns_under(&client.join("analysis")).await.len(), 2);
  }
}
