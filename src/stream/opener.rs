//! HTTP stream opener for the platform's live playback endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::LOCATION;
use reqwest::Response;
use tracing::{debug, instrument};

use super::handle::{StreamHandle, StreamOpener};
use crate::config::CameraSpec;
use crate::error::{Error, Result};
use crate::session::{AuthSession, RequestSpec};

/// Live FLV playback endpoint.
pub const PLAYBACK_PATH: &str = "/asset/play/video.flv";

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// Opens live playback streams through an [`AuthSession`].
pub struct LiveStreamOpener {
    session: Arc<AuthSession>,
}

impl LiveStreamOpener {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self { session }
    }

    /// Playback request starting "now" and running open-ended.
    fn playback_request(camera: &CameraSpec) -> RequestSpec {
        RequestSpec::get(PLAYBACK_PATH)
            .query("id", &camera.esn)
            .query("start_timestamp", format!("stream_{}", Utc::now().timestamp()))
            .query("end_timestamp", "+300000")
            .query("index", "true")
    }
}

#[async_trait]
impl StreamOpener for LiveStreamOpener {
    #[instrument(skip(self), fields(camera = %camera.name))]
    async fn open_stream(&self, camera: &CameraSpec) -> Result<Box<dyn StreamHandle>> {
        debug!("Making playback request");
        let mut spec = Self::playback_request(camera);
        let mut login_overhead = Duration::ZERO;

        for _ in 0..=MAX_REDIRECTS {
            let (response, login_time) = self.session.send_timed(&spec).await?;
            login_overhead += login_time;
            let status = response.status();

            if status.is_redirection() {
                // The account host hands streams off to the camera's edge host
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| Error::StreamOpen {
                        camera: camera.name.clone(),
                        reason: format!("redirect {} without Location", status.as_u16()),
                    })?;
                let next = response.url().join(location)?;
                debug!(%next, "Following playback redirect");
                spec = RequestSpec::get_url(next);
                continue;
            }

            if !status.is_success() {
                return Err(Error::StreamOpen {
                    camera: camera.name.clone(),
                    reason: format!("Playback failed with code {}", status.as_u16()),
                });
            }

            return Ok(Box::new(HttpStreamHandle {
                response,
                login_overhead,
            }));
        }

        Err(Error::StreamOpen {
            camera: camera.name.clone(),
            reason: format!("more than {MAX_REDIRECTS} redirects"),
        })
    }
}

/// Live playback body read chunk by chunk as it arrives.
pub struct HttpStreamHandle {
    response: Response,
    login_overhead: Duration,
}

#[async_trait]
impl StreamHandle for HttpStreamHandle {
    async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        self.response
            .chunk()
            .await
            .map_err(|e| Error::StreamRead(e.to_string()))
    }

    fn login_overhead(&self) -> Duration {
        self.login_overhead
    }
}
