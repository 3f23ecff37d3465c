//! Continuous stream reader
//!
//! Reads a camera's live stream indefinitely, discarding the content.
//! Whenever the stream errors or ends it is reopened at once; a failed
//! open is retried after an exponential backoff. Only cancellation ends
//! the loop, which makes stream flapping visible in the logs instead of
//! fatal.
//!
//! ```text
//! Opening ──▶ Reading ──(error / end of stream)──▶ Opening ──▶ …
//!    │           │
//!    └───────────┴──(cancelled)──▶ Cancelled
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::{StreamHandle, StreamOpener};
use crate::config::{CameraSpec, DEFAULT_OPEN_RETRY_BACKOFF_MS, DEFAULT_SLOW_CHUNK_THRESHOLD_MS};
use crate::error::Error;

/// Tuning for [`ContinuousReader`].
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    /// Chunks taking longer than this are reported.
    pub slow_chunk_threshold: Duration,
    /// Emit a progress line every this many chunks (0 disables).
    pub progress_every: u64,
    /// First wait after a failed open; zero reopens at once.
    pub initial_backoff: Duration,
    /// Upper bound for the open-failure backoff.
    pub max_backoff: Duration,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            slow_chunk_threshold: Duration::from_millis(DEFAULT_SLOW_CHUNK_THRESHOLD_MS),
            progress_every: 100,
            initial_backoff: Duration::from_millis(DEFAULT_OPEN_RETRY_BACKOFF_MS),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Totals over a whole continuous read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderSummary {
    /// Streams opened successfully.
    pub connections: u32,
    pub open_failures: u32,
    /// Connections that ended with a read error.
    pub read_errors: u32,
    /// Connections the remote side closed cleanly.
    pub closures: u32,
    pub bytes_read: u64,
}

impl ReaderSummary {
    /// Times the stream had to be opened again after a connection ended.
    pub fn reconnects(&self) -> u32 {
        self.read_errors + self.closures
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Opening,
    Reading,
    Cancelled,
}

enum ReadOutcome {
    Cancelled,
    Ended,
    Failed(Error),
}

/// Drives one camera's stream until cancelled.
pub struct ContinuousReader {
    opener: Arc<dyn StreamOpener>,
    settings: ReaderSettings,
}

impl ContinuousReader {
    pub fn new(opener: Arc<dyn StreamOpener>) -> Self {
        Self::with_settings(opener, ReaderSettings::default())
    }

    pub fn with_settings(opener: Arc<dyn StreamOpener>, settings: ReaderSettings) -> Self {
        Self { opener, settings }
    }

    /// Read `camera` until `cancel` fires.
    ///
    /// Cancellation is observed between reads and around open attempts; a
    /// read already waiting on the network is allowed to finish.
    pub async fn run(&self, camera: &CameraSpec, cancel: &CancellationToken) -> ReaderSummary {
        let mut summary = ReaderSummary::default();
        let mut backoff = self.settings.initial_backoff;

        while !cancel.is_cancelled() {
            debug!(camera = %camera.name, state = ?ReaderState::Opening, "Stream state");
            let mut handle = match self.opener.open_stream(camera).await {
                Ok(handle) => handle,
                Err(e) => {
                    summary.open_failures += 1;
                    if backoff.is_zero() {
                        warn!(camera = %camera.name, error = %e, "Fetch failed, retrying");
                        continue;
                    }
                    warn!(
                        camera = %camera.name,
                        error = %e,
                        "Fetch failed, sleeping for {}s before retrying",
                        backoff.as_secs_f64()
                    );
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(self.settings.max_backoff);
                    continue;
                }
            };

            backoff = self.settings.initial_backoff;
            summary.connections += 1;
            debug!(camera = %camera.name, state = ?ReaderState::Reading, connection = summary.connections, "Stream state");

            let outcome = self.read_connection(camera, handle.as_mut(), cancel, &mut summary).await;
            handle.close();

            match outcome {
                ReadOutcome::Cancelled => break,
                ReadOutcome::Ended => {
                    summary.closures += 1;
                    debug!(camera = %camera.name, "Stream ended, reopening");
                }
                ReadOutcome::Failed(e) => {
                    summary.read_errors += 1;
                    warn!(camera = %camera.name, error = %e, "Stream read failed, reopening");
                }
            }
        }

        debug!(camera = %camera.name, state = ?ReaderState::Cancelled, "Stream state");
        summary
    }

    async fn read_connection(
        &self,
        camera: &CameraSpec,
        handle: &mut dyn StreamHandle,
        cancel: &CancellationToken,
        summary: &mut ReaderSummary,
    ) -> ReadOutcome {
        let connected = Instant::now();
        let mut chunk_start = connected;
        let mut chunks = 0u64;
        let mut bytes = 0u64;

        let outcome = loop {
            if cancel.is_cancelled() {
                break ReadOutcome::Cancelled;
            }

            match handle.read_chunk().await {
                Ok(Some(chunk)) => {
                    chunks += 1;
                    bytes += chunk.len() as u64;

                    let took = chunk_start.elapsed();
                    if took >= self.settings.slow_chunk_threshold {
                        warn!(camera = %camera.name, "Chunk {chunks} took {}ms", took.as_millis());
                    }
                    if self.settings.progress_every > 0 && chunks % self.settings.progress_every == 0 {
                        info!(
                            camera = %camera.name,
                            "Read {bytes} bytes in {}ms",
                            connected.elapsed().as_millis()
                        );
                    }
                    chunk_start = Instant::now();
                }
                Ok(None) => break ReadOutcome::Ended,
                Err(e) => break ReadOutcome::Failed(e),
            }
        };

        summary.bytes_read += bytes;
        info!(
            camera = %camera.name,
            "Playback up for {}ms with {bytes} bytes read",
            connected.elapsed().as_millis()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Every third read across all connections fails.
    struct FlakySource {
        reads: Arc<AtomicU32>,
        opens: AtomicU32,
        cancel_on_open: u32,
        cancel: CancellationToken,
    }

    struct FlakyHandle {
        reads: Arc<AtomicU32>,
    }

    #[async_trait]
    impl StreamHandle for FlakyHandle {
        async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if n % 3 == 0 {
                Err(Error::StreamRead("connection reset".to_string()))
            } else {
                Ok(Some(Bytes::from_static(b"0123456789")))
            }
        }
    }

    #[async_trait]
    impl StreamOpener for FlakySource {
        async fn open_stream(&self, _camera: &CameraSpec) -> Result<Box<dyn StreamHandle>> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.cancel_on_open {
                self.cancel.cancel();
            }
            Ok(Box::new(FlakyHandle {
                reads: Arc::clone(&self.reads),
            }))
        }
    }

    /// Fails the first `failures` opens, then serves streams that end immediately.
    struct UnreliableOpener {
        opens: AtomicU32,
        failures: u32,
        cancel_on_open: Option<u32>,
        cancel: CancellationToken,
    }

    struct EmptyHandle;

    #[async_trait]
    impl StreamHandle for EmptyHandle {
        async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl StreamOpener for UnreliableOpener {
        async fn open_stream(&self, camera: &CameraSpec) -> Result<Box<dyn StreamHandle>> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(Error::StreamOpen {
                    camera: camera.name.clone(),
                    reason: "Playback failed with code 503".to_string(),
                });
            }
            if Some(n) == self.cancel_on_open {
                self.cancel.cancel();
            }
            Ok(Box::new(EmptyHandle))
        }
    }

    fn camera() -> CameraSpec {
        CameraSpec::new("lobby", "100a")
    }

    #[tokio::test]
    async fn reconnects_after_every_read_error_until_cancelled() {
        let cancel = CancellationToken::new();
        let reads = Arc::new(AtomicU32::new(0));
        let source = Arc::new(FlakySource {
            reads: Arc::clone(&reads),
            opens: AtomicU32::new(0),
            cancel_on_open: 4,
            cancel: cancel.clone(),
        });

        let reader = ContinuousReader::new(source);
        let summary = reader.run(&camera(), &cancel).await;

        assert_eq!(summary.connections, 4);
        assert_eq!(summary.read_errors, 3);
        assert_eq!(summary.closures, 0);
        assert_eq!(summary.reconnects(), 3);
        assert_eq!(summary.bytes_read, 60);
        assert_eq!(reads.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn already_cancelled_returns_without_opening() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let source = Arc::new(FlakySource {
            reads: Arc::new(AtomicU32::new(0)),
            opens: AtomicU32::new(0),
            cancel_on_open: 0,
            cancel: cancel.clone(),
        });

        let summary = ContinuousReader::new(source).run(&camera(), &cancel).await;
        assert_eq!(summary, ReaderSummary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_opens_back_off_exponentially() {
        let cancel = CancellationToken::new();
        let opener = Arc::new(UnreliableOpener {
            opens: AtomicU32::new(0),
            failures: 3,
            cancel_on_open: Some(5),
            cancel: cancel.clone(),
        });

        let start = tokio::time::Instant::now();
        let summary = ContinuousReader::new(opener).run(&camera(), &cancel).await;
        let elapsed = start.elapsed();

        assert_eq!(summary.open_failures, 3);
        assert_eq!(summary.connections, 2);
        assert_eq!(summary.closures, 1);
        // 1s + 2s + 4s of backoff, nothing after the clean closure
        assert!(elapsed >= Duration::from_secs(7), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(8), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff_wait() {
        let cancel = CancellationToken::new();
        let opener = Arc::new(UnreliableOpener {
            opens: AtomicU32::new(0),
            failures: u32::MAX,
            cancel_on_open: None,
            cancel: cancel.clone(),
        });

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let summary = ContinuousReader::new(opener).run(&camera(), &cancel).await;

        // Opens at 0s, 1s, 3s, 7s; the 8s wait from 7s is cut short at 10s
        assert_eq!(summary.open_failures, 4);
        assert_eq!(summary.connections, 0);
        assert!(start.elapsed() < Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_backoff_reopens_failed_opens_immediately() {
        let cancel = CancellationToken::new();
        let opener = Arc::new(UnreliableOpener {
            opens: AtomicU32::new(0),
            failures: 5,
            cancel_on_open: Some(6),
            cancel: cancel.clone(),
        });
        let settings = ReaderSettings {
            initial_backoff: Duration::ZERO,
            ..ReaderSettings::default()
        };

        let start = tokio::time::Instant::now();
        let summary = ContinuousReader::with_settings(opener, settings)
            .run(&camera(), &cancel)
            .await;

        assert_eq!(summary.open_failures, 5);
        assert_eq!(summary.connections, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn default_settings_match_tool_defaults() {
        let settings = ReaderSettings::default();
        assert_eq!(settings.slow_chunk_threshold, Duration::from_millis(5000));
        assert_eq!(settings.progress_every, 100);
        assert_eq!(settings.initial_backoff, Duration::from_secs(1));
        assert_eq!(settings.max_backoff, Duration::from_secs(60));
    }
}
