//! `eeprobe` - Live stream latency tester for Eagle Eye Networks cameras
//!
//! # Features
//!
//! - **Auth Session**: two-step login, regional host discovery, reactive re-login on 401
//! - **First-byte latency**: repeated trials per camera with min/avg/median/max
//! - **Stream stability**: continuous reading with automatic reconnect
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use eeprobe::{AuthSession, Config, LatencyProber, LiveStreamOpener};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Path::new("cameras.json"))?;
//!     let auth = Arc::new(AuthSession::from_config(&config, config.credentials())?);
//!     auth.login().await?;
//!
//!     let prober = LatencyProber::new(Arc::new(LiveStreamOpener::new(auth)));
//!     let results = prober.run_trials(&config.cameras(), 3, config.delay_between_runs()).await;
//!     for camera in results.report().cameras {
//!         println!("{}: {}", camera.camera, camera.stats);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http_client;
pub mod probe;
pub mod session;
pub mod stats;
pub mod stream;

pub use config::{CameraSpec, Config, Credentials};
pub use error::{Error, Result};
pub use probe::{CameraLatency, CameraWarning, LatencyProber, LatencyReport, LatencySample, TrialResults};
pub use session::{AuthSession, RequestSpec, Session};
pub use stats::{summarize, summarize_millis, LatencyStats};
pub use stream::{ContinuousReader, LiveStreamOpener, ReaderSettings, ReaderSummary, StreamHandle, StreamOpener};

/// Version of eeprobe
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
