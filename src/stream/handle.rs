//! Stream opener and handle traits.
//!
//! A [`StreamOpener`] turns a [`CameraSpec`] into a live [`StreamHandle`].
//! The prober and the continuous reader only see these traits, so they can
//! be driven by the HTTP implementation in
//! [`LiveStreamOpener`](super::opener::LiveStreamOpener) or by in-memory
//! sources.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::CameraSpec;
use crate::error::Result;

/// A live, unbuffered byte source.
#[async_trait]
pub trait StreamHandle: Send {
    /// Next chunk as it arrives; `None` once the remote side ends the stream.
    async fn read_chunk(&mut self) -> Result<Option<Bytes>>;

    /// Time spent logging in while this stream was being opened.
    fn login_overhead(&self) -> Duration {
        Duration::ZERO
    }

    /// Release the connection.
    fn close(self: Box<Self>) {}
}

/// Opens live streams for cameras.
#[async_trait]
pub trait StreamOpener: Send + Sync {
    async fn open_stream(&self, camera: &CameraSpec) -> Result<Box<dyn StreamHandle>>;
}
