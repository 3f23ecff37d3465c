//! Error types for the stream session engine.

use thiserror::Error;

/// Errors raised while authenticating, opening, probing, or summarizing.
#[derive(Error, Debug)]
pub enum Error {
    /// Credentials rejected, or the re-login retry was exhausted.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection-level failure (DNS, TCP, TLS, timeout).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The stream endpoint answered with something other than a live stream.
    #[error("Could not open stream for {camera}: {reason}")]
    StreamOpen { camera: String, reason: String },

    /// An open stream broke while being read.
    #[error("Stream read failed: {0}")]
    StreamRead(String),

    /// A single probe trial failed; attributed to the camera and trial.
    #[error("Probe of {camera} failed in trial {trial}: {source}")]
    Probe {
        camera: String,
        trial: u32,
        #[source]
        source: Box<Error>,
    },

    /// Nothing to summarize.
    #[error("No latency samples to summarize")]
    InsufficientData,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Wrap `self` as a probe failure for `camera` in `trial`.
    #[must_use]
    pub fn into_probe(self, camera: &str, trial: u32) -> Self {
        Error::Probe {
            camera: camera.to_string(),
            trial,
            source: Box::new(self),
        }
    }

    /// `true` when the underlying cause is an authorization failure.
    pub fn is_auth(&self) -> bool {
        match self {
            Error::Auth(_) => true,
            Error::Probe { source, .. } => source.is_auth(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
