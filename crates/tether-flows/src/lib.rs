//! Tether Flows
//!
//! Flow kinds built on [`tether_flow`].
//!
//! - [`TakeScreenshot`] captures the screen of a client, retrieves the image
//!   through the [`GET_FILE`] sub-flow and stores it under
//!   `<client>/analysis/screencaps`.
//! - [`GetFileArgs`] is the parameter contract of the `GetFile` sub-flow. The
//!   sub-flow itself is served by whatever [`SubFlowInvoker`] the scheduler
//!   runs with.
//!
//! [`SubFlowInvoker`]: tether_flow::SubFlowInvoker

mod get_file;
mod screenshot;

pub use get_file::{GET_FILE, GetFileArgs};
pub use screenshot::{ScreenshotState, TakeScreenshot, screencap_filename};
