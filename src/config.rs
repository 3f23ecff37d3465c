//! Tester configuration loaded from a JSON file.
//!
//! ```json
//! {
//!   "email": "ops@example.com",
//!   "auth_token": "api-key",
//!   "cameras": { "lobby": "100a1b2c", "dock": "100d3e4f" },
//!   "delay_between_runs_seconds": 30
//! }
//! ```
//!
//! `password` may be omitted, in which case it is prompted for at startup.

use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Default login endpoint of the platform.
pub const DEFAULT_LOGIN_URL: &str = "https://login.eagleeyenetworks.com";

/// Seconds between latency trials when the config does not say.
pub const DEFAULT_DELAY_BETWEEN_RUNS_SECONDS: u64 = 60;

/// Chunks slower than this are reported while streaming.
pub const DEFAULT_SLOW_CHUNK_THRESHOLD_MS: u64 = 5000;

/// First wait after a stream fails to open; doubles on each further failure.
pub const DEFAULT_OPEN_RETRY_BACKOFF_MS: u64 = 1000;

/// Account credentials used for login.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: Option<String>,
    pub auth_token: String,
}

impl Credentials {
    /// Fill in a missing password by prompting on `output` and reading a line from `input`.
    pub fn resolve_password<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<()> {
        if self.password.is_some() {
            return Ok(());
        }

        write!(output, "Please enter Eagle Eye password: ")?;
        output.flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;
        let password = line.trim_end_matches(['\r', '\n']).to_string();
        if password.is_empty() {
            return Err(Error::Config("No password entered".to_string()));
        }
        self.password = Some(password);
        Ok(())
    }

    /// Password for the login form; empty when none was configured.
    pub fn password_or_empty(&self) -> &str {
        self.password.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// A named camera and its provider-assigned ESN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSpec {
    pub name: String,
    pub esn: String,
}

impl CameraSpec {
    pub fn new(name: impl Into<String>, esn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            esn: esn.into(),
        }
    }
}

/// Parsed and validated configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(alias = "authToken")]
    pub auth_token: String,
    /// Camera name to ESN, in file order.
    pub cameras: IndexMap<String, String>,
    #[serde(default = "default_delay", alias = "delayBetweenRunsSeconds")]
    pub delay_between_runs_seconds: u64,
    #[serde(default = "default_login_url", alias = "loginUrl")]
    pub login_url: String,
    /// Regional host to use when login does not name one.
    #[serde(default, alias = "apiHost")]
    pub api_host: Option<String>,
    #[serde(default = "default_max_auth_retries", alias = "maxAuthRetries")]
    pub max_auth_retries: u32,
    #[serde(default = "default_slow_chunk_threshold", alias = "slowChunkThresholdMs")]
    pub slow_chunk_threshold_ms: u64,
    #[serde(default = "default_request_timeout", alias = "requestTimeoutSeconds")]
    pub request_timeout_seconds: u64,
    /// 0 reopens a stream that failed to open without waiting.
    #[serde(default = "default_open_retry_backoff", alias = "openRetryBackoffMs")]
    pub open_retry_backoff_ms: u64,
}

fn default_delay() -> u64 {
    DEFAULT_DELAY_BETWEEN_RUNS_SECONDS
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_max_auth_retries() -> u32 {
    1
}

fn default_slow_chunk_threshold() -> u64 {
    DEFAULT_SLOW_CHUNK_THRESHOLD_MS
}

fn default_request_timeout() -> u64 {
    10
}

fn default_open_retry_backoff() -> u64 {
    DEFAULT_OPEN_RETRY_BACKOFF_MS
}

impl Config {
    /// Read, parse and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!("Could not find config file {}", path.display()))
            } else {
                Error::Io(e)
            }
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a config from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Could not parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(Error::Config("No user found in config".to_string()));
        }
        if self.auth_token.trim().is_empty() {
            return Err(Error::Config("No auth_token found in config".to_string()));
        }
        if self.cameras.is_empty() {
            return Err(Error::Config("At least one camera must be configured".to_string()));
        }
        for (name, esn) in &self.cameras {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(Error::Config(format!(
                    "Invalid camera name {name:?}: must be non-empty without whitespace"
                )));
            }
            if esn.trim().is_empty() {
                return Err(Error::Config(format!("Camera {name} has an empty identifier")));
            }
        }
        Url::parse(&self.login_url)
            .map_err(|e| Error::Config(format!("Invalid login_url {}: {e}", self.login_url)))?;
        if let Some(ref host) = self.api_host {
            Url::parse(host).map_err(|e| Error::Config(format!("Invalid api_host {host}: {e}")))?;
        }
        Ok(())
    }

    /// Cameras in configuration order.
    pub fn cameras(&self) -> Vec<CameraSpec> {
        self.cameras
            .iter()
            .map(|(name, esn)| CameraSpec::new(name, esn))
            .collect()
    }

    /// Look up a single camera by name.
    pub fn camera(&self, name: &str) -> Option<CameraSpec> {
        self.cameras.get(name).map(|esn| CameraSpec::new(name, esn))
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            email: self.email.clone(),
            password: self.password.clone(),
            auth_token: self.auth_token.clone(),
        }
    }

    pub fn delay_between_runs(&self) -> Duration {
        Duration::from_secs(self.delay_between_runs_seconds)
    }

    pub fn slow_chunk_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_chunk_threshold_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn open_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.open_retry_backoff_ms)
    }
}
