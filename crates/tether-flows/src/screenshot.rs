//! The screen capture flow.
//!
//! ```text
//! Start ──capture──▶ RetrieveFile ──GetFile──▶ ProcessFile ──cleanup──▶ FinishedRemove ─▶ End
//! ```
//!
//! Platform mismatch, a failed capture and a failed retrieval abort the flow.
//! A failed cleanup is only written to the flow log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tether_artifact::{ArtifactKind, Pathspec, Urn, attributes};
use tether_config::ScreenshotConfig;
use tether_flow::{
  CommandDescriptor, Flow, FlowContext, FlowError, FlowState, NotificationKind, OutboundCall,
  ResponseEnvelope, ResponseRecord, StepResult, Transition,
};
use tracing::{debug, info};

use crate::get_file::GetFileArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenshotState {
  Start,
  RetrieveFile,
  ProcessFile,
  FinishedRemove,
  End,
}

impl FlowState for ScreenshotState {
  const INITIAL: Self = Self::Start;
  const TERMINAL: Self = Self::End;

  fn all() -> &'static [Self] {
    &[
      Self::Start,
      Self::RetrieveFile,
      Self::ProcessFile,
      Self::FinishedRemove,
      Self::End,
    ]
  }

  fn name(&self) -> &'static str {
    match self {
      Self::Start => "Start",
      Self::RetrieveFile => "RetrieveFile",
      Self::ProcessFile => "ProcessFile",
      Self::FinishedRemove => "FinishedRemove",
      Self::End => "End",
    }
  }

  fn next_states(&self) -> &'static [Self] {
    match self {
      Self::Start => &[Self::RetrieveFile],
      Self::RetrieveFile => &[Self::ProcessFile],
      Self::ProcessFile => &[Self::FinishedRemove],
      Self::FinishedRemove | Self::End => &[],
    }
  }
}

/// Take a screenshot of a client.
///
/// The client snapshot at `tether:/<client_id>` must carry the `system`
/// attribute; its `hostname` attribute names the stored capture, falling
/// back to the client id when absent.
#[derive(Debug, Clone)]
pub struct TakeScreenshot {
  config: ScreenshotConfig,
  hostname: Option<String>,
  screencap: Option<Urn>,
  filename: Option<String>,
}

impl TakeScreenshot {
  pub fn new(config: ScreenshotConfig) -> Self {
    Self {
      config,
      hostname: None,
      screencap: None,
      filename: None,
    }
  }

  pub fn hostname(&self) -> Option<&str> {
    self.hostname.as_deref()
  }

  /// Where the capture was stored, once `ProcessFile` has run.
  pub fn screencap(&self) -> Option<&Urn> {
    self.screencap.as_ref()
  }

  pub fn filename(&self) -> Option<&str> {
    self.filename.as_deref()
  }

  async fn start(&mut self, ctx: &FlowContext) -> StepResult<ScreenshotState> {
    let client = ctx.store().open(&ctx.client_urn()).await?;

    let system = client.attribute(attributes::SYSTEM);
    if system != Some(self.config.supported_system.as_str()) {
      return Err(FlowError::abort(format!(
        "unsupported platform: {} (screen capture requires {})",
        system.unwrap_or("unknown"),
        self.config.supported_system
      )));
    }

    let hostname = client
      .attribute(attributes::HOSTNAME)
      .unwrap_or(ctx.client_id())
      .to_string();
    debug!(flow_id = %ctx.flow_id(), hostname = %hostname, "client_resolved");
    self.hostname = Some(hostname);

    let capture = CommandDescriptor::new(
      self.config.capture_program.as_str(),
      self
        .config
        .capture_args
        .iter()
        .chain(std::iter::once(&self.config.capture_path))
        .cloned(),
      self.config.capture_time_limit(),
    );
    Ok(Transition::call(
      OutboundCall::Command(capture),
      ScreenshotState::RetrieveFile,
    ))
  }

  fn retrieve_file(&mut self, responses: ResponseEnvelope) -> StepResult<ScreenshotState> {
    let exit_status = responses.first().map(|record| record.exit_status);
    if !responses.success() || exit_status != Some(0) {
      return Err(FlowError::abort(format!(
        "capture failed to run: {}",
        responses.status()
      )));
    }

    let call = GetFileArgs::new(Pathspec::os(self.config.capture_path.as_str())).into_call()?;
    Ok(Transition::call(call, ScreenshotState::ProcessFile))
  }

  async fn process_file(
    &mut self,
    responses: ResponseEnvelope,
    ctx: &FlowContext,
  ) -> StepResult<ScreenshotState> {
    if !responses.success() {
      return Err(FlowError::abort(format!(
        "failed to retrieve captured file, this is commonly caused by the screen being off: {}",
        responses.status()
      )));
    }

    let retrieved = responses
      .first()
      .and_then(ResponseRecord::artifact_urn)
      .ok_or_else(|| FlowError::abort("file retrieval reported no stored file"))?;
    let mut reader = ctx.store().open(retrieved).await?;
    let data = reader.read(self.config.max_read_bytes);

    let hostname = self.hostname.as_deref().unwrap_or(ctx.client_id());
    let filename = screencap_filename(hostname, ctx.now());
    let screencap = ctx
      .client_urn()
      .join("analysis")
      .join("screencaps")
      .join(&filename);

    let mut writer = ctx.store().create(&screencap, ArtifactKind::File).await?;
    writer.write(&data);
    ctx.store().close(writer).await?;
    info!(
      flow_id = %ctx.flow_id(),
      urn = %screencap,
      size = data.len(),
      "screencap_stored"
    );

    self.filename = Some(filename);
    self.screencap = Some(screencap);

    let cleanup = CommandDescriptor::new(
      self.config.cleanup_program.as_str(),
      self
        .config
        .cleanup_args
        .iter()
        .chain(std::iter::once(&self.config.capture_path))
        .cloned(),
      self.config.cleanup_time_limit(),
    );
    Ok(Transition::call(
      OutboundCall::Command(cleanup),
      ScreenshotState::FinishedRemove,
    ))
  }

  fn finished_remove(
    &mut self,
    responses: ResponseEnvelope,
    ctx: &FlowContext,
  ) -> StepResult<ScreenshotState> {
    if !responses.success() {
      ctx.log("failed to remove captured file");
    }
    Ok(Transition::Done)
  }

  fn end(&mut self, ctx: &FlowContext) -> StepResult<ScreenshotState> {
    let (Some(screencap), Some(filename)) = (&self.screencap, &self.filename) else {
      return Err(FlowError::abort("no screencap was stored"));
    };
    ctx.notify(
      NotificationKind::ViewObject,
      screencap.clone(),
      format!("Got screencap {}", filename),
    );
    Ok(Transition::Done)
  }
}

#[async_trait]
impl Flow for TakeScreenshot {
  type State = ScreenshotState;
  const NAME: &'static str = "TakeScreenshot";

  async fn step(
    &mut self,
    state: ScreenshotState,
    responses: Option<ResponseEnvelope>,
    ctx: &FlowContext,
  ) -> StepResult<ScreenshotState> {
    let missing = || FlowError::MissingResponses {
      state: state.name(),
    };
    match state {
      ScreenshotState::Start => self.start(ctx).await,
      ScreenshotState::RetrieveFile => self.retrieve_file(responses.ok_or_else(missing)?),
      ScreenshotState::ProcessFile => {
        self
          .process_file(responses.ok_or_else(missing)?, ctx)
          .await
      }
      ScreenshotState::FinishedRemove => {
        self.finished_remove(responses.ok_or_else(missing)?, ctx)
      }
      ScreenshotState::End => self.end(ctx),
    }
  }
}

/// Name of a stored capture: `<hostname>.screencap.<asctime>`, with the
/// timestamp in UTC at second resolution (`Mon Oct 19 12:00:05 2026`).
///
/// The name is always a single URN segment: `/` in the hostname becomes `_`.
pub fn screencap_filename(hostname: &str, at: DateTime<Utc>) -> String {
  format!(
    "{}.screencap.{}",
    hostname.replace('/', "_"),
    at.format("%a %b %e %H:%M:%S %Y")
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_screencap_filename() {
    let at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 5).unwrap();
    assert_eq!(
      screencap_filename("host1", at),
      "host1.screencap.Mon Oct 19 12:00:05 2026"
    );

    // asctime pads single-digit days with a space
    let at = Utc.with_ymd_and_hms(2026, 10, 5, 9, 3, 0).unwrap();
    assert_eq!(
      screencap_filename("host1", at),
      "host1.screencap.Mon Oct  5 09:03:00 2026"
    );
  }

  #[test]
  fn test_screencap_filename_is_one_segment() {
    let at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 5).unwrap();
    let filename = screencap_filename("../../C.2/x", at);
    assert_eq!(filename, ".._.._C.2_x.screencap.Mon Oct 19 12:00:05 2026");

    let urn = Urn::root().join("C.1").join(&filename);
    assert_eq!(urn.segments().len(), 2);
    assert_eq!(urn.basename(), Some(filename.as_str()));
  }

  #[test]
  fn test_state_table_is_valid() {
    assert_eq!(tether_flow::validate_states::<TakeScreenshot>(), Ok(()));
  }

  #[test]
  fn test_states_route_by_name() {
    assert_eq!(
      ScreenshotState::from_name("FinishedRemove"),
      Some(ScreenshotState::FinishedRemove)
    );
    assert!(ScreenshotState::FinishedRemove.next_states().is_empty());
    assert_eq!(ScreenshotState::from_name("Cleanup"), None);
  }
}
