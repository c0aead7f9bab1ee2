use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tether_agent::{ClientInfo, LocalCommandChannel, LocalFileFetcher, enroll};
use tether_artifact::{ArtifactStore, FsStore, Urn};
use tether_config::TetherConfig;
use tether_flow::{ChannelSink, Notification, Scheduler, Services, SystemClock, TracingSink};
use tether_flows::TakeScreenshot;

/// Tether - drive a remote agent through suspendable flows
#[derive(Parser)]
#[command(name = "tether")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.tether)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Path to a JSON configuration file
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Record this machine as a client
  Enroll {
    #[arg(long)]
    client_id: String,

    /// Override the detected hostname
    #[arg(long)]
    hostname: Option<String>,

    /// Override the detected operating system family
    #[arg(long)]
    system: Option<String>,

    /// Replace an existing snapshot
    #[arg(long)]
    force: bool,
  },

  /// Take a screenshot of an enrolled client
  Screenshot {
    #[arg(long)]
    client_id: String,

    /// Principal notified when the screenshot is stored
    #[arg(long, default_value = "admin")]
    owner: String,
  },

  /// List the children of an artifact
  List {
    /// Artifact URN (default: tether:/)
    urn: Option<String>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".tether"),
  };
  let config = match &cli.config {
    Some(path) => TetherConfig::from_file(path)?,
    None => TetherConfig::default(),
  };

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Some(Commands::Enroll {
      client_id,
      hostname,
      system,
      force,
    }) => rt.block_on(run_enroll(&data_dir, &client_id, hostname, system, force)),
    Some(Commands::Screenshot { client_id, owner }) => {
      rt.block_on(run_screenshot(&data_dir, config, &client_id, &owner))
    }
    Some(Commands::List { urn }) => rt.block_on(run_list(&data_dir, urn.as_deref())),
    None => {
      println!("tether - use --help to see available commands");
      Ok(())
    }
  }
}

fn open_store(data_dir: &Path) -> Arc<FsStore> {
  Arc::new(FsStore::new(data_dir.join("store")))
}

async fn run_enroll(
  data_dir: &Path,
  client_id: &str,
  hostname: Option<String>,
  system: Option<String>,
  force: bool,
) -> Result<()> {
  let mut info = ClientInfo::local().context("failed to interrogate this machine")?;
  if let Some(hostname) = hostname {
    info.hostname = hostname;
  }
  if let Some(system) = system {
    info.system = system;
  }

  let store = open_store(data_dir);
  let urn = enroll(store.as_ref(), client_id, &info, force)
    .await
    .with_context(|| format!("failed to enroll client {}", client_id))?;

  println!("{} hostname={} system={}", urn, info.hostname, info.system);
  Ok(())
}

async fn run_screenshot(
  data_dir: &Path,
  config: TetherConfig,
  client_id: &str,
  owner: &str,
) -> Result<()> {
  let store = open_store(data_dir);
  let (notifier, mut notifications) = ChannelSink::<Notification>::channel();
  let services = Services {
    store: store.clone(),
    notifier: Arc::new(notifier),
    log: Arc::new(TracingSink),
    clock: Arc::new(SystemClock),
  };

  let mut scheduler = Scheduler::new(
    services,
    Arc::new(LocalCommandChannel::new(config.agent.clone())),
    Arc::new(LocalFileFetcher::new(store, config.agent)),
  );

  let flow_id = scheduler
    .start(TakeScreenshot::new(config.screenshot), client_id, owner)
    .await
    .context("screenshot flow failed to start")?;
  info!(flow_id = %flow_id, client_id = %client_id, "screenshot_started");

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      on_interrupt.cancel();
    }
  });
  scheduler
    .run_until_idle(cancel)
    .await
    .context("screenshot flow interrupted")?;

  while let Ok(notification) = notifications.try_recv() {
    eprintln!("{}", notification.message);
    println!("{}", notification.reference);
  }

  let outcome = scheduler
    .outcome(&flow_id)
    .context("screenshot flow left no outcome")?;
  eprintln!("{}", serde_json::to_string_pretty(outcome)?);

  if !outcome.is_completed() {
    bail!("screenshot flow {} failed", flow_id);
  }
  Ok(())
}

async fn run_list(data_dir: &Path, urn: Option<&str>) -> Result<()> {
  let urn = match urn {
    Some(urn) => Urn::parse(urn)?,
    None => Urn::root(),
  };

  let store = open_store(data_dir);
  for child in store.list_children(&urn).await? {
    println!("{}", child);
  }
  Ok(())
}
