//! First-byte latency probing
//!
//! A probe opens a camera's live stream, waits for the first byte and
//! closes it again. [`LatencyProber::run_trials`] repeats that for every
//! camera in configuration order, pausing between trials, and collects the
//! samples for [`summarize`](crate::stats::summarize).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::CameraSpec;
use crate::error::{Error, Result};
use crate::stats::{summarize, LatencyStats};
use crate::stream::StreamOpener;

/// One successful first-byte measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySample {
    pub camera: String,
    /// 1-based trial number.
    pub trial: u32,
    pub elapsed: Duration,
}

impl LatencySample {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Samples and failure count for one camera.
#[derive(Debug, Clone, Default)]
pub struct CameraTrials {
    pub samples: Vec<LatencySample>,
    pub failures: u32,
}

/// Everything collected by [`LatencyProber::run_trials`], in camera order.
#[derive(Debug, Clone, Default)]
pub struct TrialResults {
    cameras: IndexMap<String, CameraTrials>,
}

impl TrialResults {
    fn new(cameras: &[CameraSpec]) -> Self {
        Self {
            cameras: cameras
                .iter()
                .map(|c| (c.name.clone(), CameraTrials::default()))
                .collect(),
        }
    }

    fn record(&mut self, sample: LatencySample) {
        self.cameras
            .entry(sample.camera.clone())
            .or_default()
            .samples
            .push(sample);
    }

    fn record_failure(&mut self, camera: &str) {
        self.cameras.entry(camera.to_string()).or_default().failures += 1;
    }

    pub fn get(&self, camera: &str) -> Option<&CameraTrials> {
        self.cameras.get(camera)
    }

    /// Summarize each camera; cameras without samples become warnings.
    pub fn report(&self) -> LatencyReport {
        let mut report = LatencyReport::default();
        for (camera, trials) in &self.cameras {
            match summarize(&trials.samples) {
                Ok(stats) => report.cameras.push(CameraLatency {
                    camera: camera.clone(),
                    stats,
                    failures: trials.failures,
                }),
                Err(error) => report.warnings.push(CameraWarning {
                    camera: camera.clone(),
                    failures: trials.failures,
                    error,
                }),
            }
        }
        report
    }
}

/// Statistics for a camera with at least one sample.
#[derive(Debug, Clone)]
pub struct CameraLatency {
    pub camera: String,
    pub stats: LatencyStats,
    /// Trials that produced no sample.
    pub failures: u32,
}

/// A camera left out of the report.
#[derive(Debug)]
pub struct CameraWarning {
    pub camera: String,
    pub failures: u32,
    pub error: Error,
}

impl fmt::Display for CameraWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} failed probe{})",
            self.camera,
            self.error,
            self.failures,
            if self.failures == 1 { "" } else { "s" }
        )
    }
}

#[derive(Debug, Default)]
pub struct LatencyReport {
    pub cameras: Vec<CameraLatency>,
    pub warnings: Vec<CameraWarning>,
}

/// Measures time to first byte of camera streams.
pub struct LatencyProber {
    opener: Arc<dyn StreamOpener>,
}

impl LatencyProber {
    pub fn new(opener: Arc<dyn StreamOpener>) -> Self {
        Self { opener }
    }

    /// Time one stream open up to its first byte.
    #[instrument(skip(self, camera), fields(camera = %camera.name))]
    pub async fn probe_once(&self, camera: &CameraSpec, trial: u32) -> Result<LatencySample> {
        let elapsed = self
            .first_byte(camera)
            .await
            .map_err(|e| e.into_probe(&camera.name, trial))?;

        debug!("{} playback took {}ms", camera.name, elapsed.as_millis());
        Ok(LatencySample {
            camera: camera.name.clone(),
            trial,
            elapsed,
        })
    }

    async fn first_byte(&self, camera: &CameraSpec) -> Result<Duration> {
        let start = Instant::now();
        let mut handle = self.opener.open_stream(camera).await?;

        let result = loop {
            match handle.read_chunk().await {
                Ok(Some(chunk)) if !chunk.is_empty() => {
                    // A login forced by a revoked token is not stream latency
                    let login = handle.login_overhead();
                    if !login.is_zero() {
                        debug!(login_ms = login.as_millis(), "Excluding login time from sample");
                    }
                    break Ok(start.elapsed().saturating_sub(login));
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    break Err(Error::StreamOpen {
                        camera: camera.name.clone(),
                        reason: "stream ended before the first byte".to_string(),
                    })
                }
                Err(e) => break Err(e),
            }
        };

        handle.close();
        result
    }

    /// Probe every camera `trial_count` times, waiting `delay` between trials.
    ///
    /// Failed probes are logged and counted, never fatal.
    pub async fn run_trials(&self, cameras: &[CameraSpec], trial_count: u32, delay: Duration) -> TrialResults {
        let mut results = TrialResults::new(cameras);

        for trial in 1..=trial_count {
            if trial > 1 {
                debug!("Waiting {}s between runs", delay.as_secs());
                tokio::time::sleep(delay).await;
            }

            info!(trial, of = trial_count, "Running trial");
            for camera in cameras {
                match self.probe_once(camera, trial).await {
                    Ok(sample) => results.record(sample),
                    Err(e) => {
                        warn!(error = %e, "Probe failed");
                        results.record_failure(&camera.name);
                    }
                }
            }
        }

        results
    }
}
