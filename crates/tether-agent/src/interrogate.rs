//! Host interrogation and client enrollment.

use tether_artifact::{ArtifactKind, ArtifactStore, Urn, attributes};
use tracing::info;

use crate::{AgentError, remove_existing};

/// What a client snapshot records about a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
  pub hostname: String,
  /// Operating system family, as `uname` reports it (`Darwin`, `Linux`).
  pub system: String,
}

impl ClientInfo {
  /// Interrogate the machine this process runs on.
  pub fn local() -> Result<Self, AgentError> {
    let hostname = hostname::get().map_err(AgentError::Hostname)?;
    Ok(Self {
      hostname: hostname.to_string_lossy().into_owned(),
      system: system_name(std::env::consts::OS).to_string(),
    })
  }
}

/// Map a Rust target OS name to the family name flows compare against.
pub fn system_name(os: &str) -> &str {
  match os {
    "macos" => "Darwin",
    "linux" => "Linux",
    "windows" => "Windows",
    "freebsd" => "FreeBSD",
    other => other,
  }
}

/// Write the snapshot of `client_id` to the store.
///
/// Snapshots are write-once; with `force` an existing snapshot is replaced,
/// otherwise enrolling a known client fails with
/// [`tether_artifact::Error::AlreadyExists`].
pub async fn enroll(
  store: &dyn ArtifactStore,
  client_id: &str,
  info: &ClientInfo,
  force: bool,
) -> Result<Urn, AgentError> {
  let urn = Urn::root().join(client_id);
  if force {
    remove_existing(store, &urn).await?;
  }

  let mut writer = store.create(&urn, ArtifactKind::Client).await?;
  writer.set_attribute(attributes::HOSTNAME, info.hostname.as_str());
  writer.set_attribute(attributes::SYSTEM, info.system.as_str());
  store.close(writer).await?;

  info!(client_id = %client_id, hostname = %info.hostname, system = %info.system, "client_enrolled");
  Ok(urn)
}

#[cfg(test)]
mod tests {
  use tether_artifact::MemoryStore;

  use super::*;

  fn info(system: &str) -> ClientInfo {
    ClientInfo {
      hostname: "host1".to_string(),
      system: system.to_string(),
    }
  }

  #[test]
  fn test_system_name() {
    assert_eq!(system_name("macos"), "Darwin");
    assert_eq!(system_name("linux"), "Linux");
    assert_eq!(system_name("openbsd"), "openbsd");
  }

  #[test]
  fn test_local_info() {
    let local = ClientInfo::local().unwrap();
    assert!(!local.hostname.is_empty());
    assert_eq!(local.system, system_name(std::env::consts::OS));
  }

  #[tokio::test]
  async fn test_enroll_writes_snapshot() {
    let store = MemoryStore::new();
    let urn = enroll(&store, "C.1", &info("Darwin"), false).await.unwrap();

    let snapshot = store.open(&urn).await.unwrap();
    assert_eq!(urn.to_string(), "tether:/C.1");
    assert_eq!(snapshot.kind(), ArtifactKind::Client);
    assert_eq!(snapshot.attribute(attributes::HOSTNAME), Some("host1"));
    assert_eq!(snapshot.attribute(attributes::SYSTEM), Some("Darwin"));
  }

  #[tokio::test]
  async fn test_reenroll_requires_force() {
    let store = MemoryStore::new();
    enroll(&store, "C.1", &info("Linux"), false).await.unwrap();

    let err = enroll(&store, "C.1", &info("Darwin"), false).await.unwrap_err();
    assert!(matches!(
      err,
      AgentError::Store(tether_artifact::Error::AlreadyExists(_))
    ));

    let urn = enroll(&store, "C.1", &info("Darwin"), true).await.unwrap();
    let snapshot = store.open(&urn).await.unwrap();
    assert_eq!(snapshot.attribute(attributes::SYSTEM), Some("Darwin"));
  }
}
