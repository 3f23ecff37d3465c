//! Live stream access for cameras
//!
//! Opening streams over the platform API and reading them continuously
//! with reconnect.

pub mod handle;
pub mod opener;
pub mod reader;

pub use handle::{StreamHandle, StreamOpener};
pub use opener::{HttpStreamHandle, LiveStreamOpener, PLAYBACK_PATH};
pub use reader::{ContinuousReader, ReaderSettings, ReaderSummary};
