//! Auth session against the platform API
//!
//! Login is a two-step exchange (`authenticate` then `authorize`) that
//! yields an `auth_key` session token and the regional host the account
//! lives on. Tokens can be revoked server-side at any time, so the session
//! is refreshed reactively: a request answered with 401 triggers one
//! re-login and one retry.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{Config, Credentials};
use crate::error::{Error, Result};
use crate::http_client::build_client;

const AUTHENTICATE_PATH: &str = "/g/aaa/authenticate";
const AUTHORIZE_PATH: &str = "/g/aaa/authorize";

/// Name of the cookie (and JSON field) carrying the session token.
const AUTH_KEY: &str = "auth_key";

/// A logged-in session. Only [`AuthSession`] creates or replaces these.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    api_host: Url,
    generation: u64,
}

impl Session {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Regional host every authorized request is sent to.
    pub fn api_host(&self) -> &Url {
        &self.api_host
    }
}

/// Where an authorized request goes.
#[derive(Debug, Clone)]
enum Target {
    /// Path on the session's regional host.
    Path(String),
    /// Fully resolved URL, e.g. a redirect `Location`.
    Absolute(Url),
}

/// Description of a request to send with the session credential.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    target: Target,
    query: Vec<(String, String)>,
}

impl RequestSpec {
    /// GET `path` on the regional host.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            target: Target::Path(path.into()),
            query: Vec::new(),
        }
    }

    /// GET an absolute URL, keeping its query string as-is.
    pub fn get_url(url: Url) -> Self {
        Self {
            method: Method::GET,
            target: Target::Absolute(url),
            query: Vec::new(),
        }
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    fn describe(&self) -> String {
        match &self.target {
            Target::Path(path) => format!("{} {path}", self.method),
            Target::Absolute(url) => format!("{} {}", self.method, url.path()),
        }
    }
}

/// Owner of the shared [`Session`]; the only way to use it is [`AuthSession::send`].
pub struct AuthSession {
    client: Client,
    credentials: Credentials,
    login_url: Url,
    api_host_override: Option<Url>,
    max_auth_retries: u32,
    session: RwLock<Option<Session>>,
    logins: AtomicU32,
    generations: AtomicU64,
}

impl AuthSession {
    pub fn new(client: Client, credentials: Credentials, login_url: Url) -> Self {
        Self {
            client,
            credentials,
            login_url,
            api_host_override: None,
            max_auth_retries: 1,
            session: RwLock::new(None),
            logins: AtomicU32::new(0),
            generations: AtomicU64::new(0),
        }
    }

    /// Build from config, with `credentials` already carrying a password.
    pub fn from_config(config: &Config, credentials: Credentials) -> Result<Self> {
        let client = build_client(config.request_timeout())?;
        let login_url = Url::parse(&config.login_url)?;
        let api_host = config.api_host.as_deref().map(Url::parse).transpose()?;

        Ok(Self::new(client, credentials, login_url)
            .with_api_host(api_host)
            .with_max_auth_retries(config.max_auth_retries))
    }

    /// Host used when login does not report a regional one.
    #[must_use]
    pub fn with_api_host(mut self, host: Option<Url>) -> Self {
        self.api_host_override = host;
        self
    }

    /// Re-logins allowed per request before giving up.
    #[must_use]
    pub fn with_max_auth_retries(mut self, retries: u32) -> Self {
        self.max_auth_retries = retries;
        self
    }

    /// Number of completed logins, initial one included.
    pub fn login_count(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    /// Copy of the current session, if logged in.
    pub async fn snapshot(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Log in and replace the current session.
    #[instrument(skip(self), fields(email = %self.credentials.email))]
    pub async fn login(&self) -> Result<()> {
        let mut guard = self.session.write().await;
        *guard = Some(self.perform_login().await?);
        Ok(())
    }

    /// Send `spec` with the session credential, re-logging in on 401.
    ///
    /// Statuses other than 401 are returned to the caller untouched.
    pub async fn send(&self, spec: &RequestSpec) -> Result<Response> {
        Ok(self.send_timed(spec).await?.0)
    }

    /// Like [`send`](Self::send), also returning the time spent logging in
    /// while serving this request.
    #[instrument(skip(self, spec), fields(request = %spec.describe()))]
    pub async fn send_timed(&self, spec: &RequestSpec) -> Result<(Response, Duration)> {
        let mut relogins = 0;
        let mut login_time = Duration::ZERO;
        loop {
            let waited = Instant::now();
            let (session, fresh) = self.current().await?;
            if fresh {
                login_time += waited.elapsed();
            }
            let response = self.dispatch(&session, spec).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                if !login_time.is_zero() {
                    debug!(login_ms = login_time.as_millis(), "Request included a login");
                }
                return Ok((response, login_time));
            }

            if relogins >= self.max_auth_retries {
                return Err(Error::Auth(format!(
                    "{} still rejected after {relogins} re-login(s)",
                    spec.describe()
                )));
            }
            relogins += 1;
            warn!("Session token rejected, logging in again");
            let relogin = Instant::now();
            self.refresh(session.generation).await?;
            login_time += relogin.elapsed();
        }
    }

    /// Current session, logging in first if there is none; `true` when it had to.
    async fn current(&self) -> Result<(Session, bool)> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok((session.clone(), false));
        }

        let mut guard = self.session.write().await;
        if let Some(session) = guard.as_ref() {
            return Ok((session.clone(), false));
        }
        let session = self.perform_login().await?;
        *guard = Some(session.clone());
        Ok((session, true))
    }

    /// Replace the session unless another caller already replaced `stale`.
    async fn refresh(&self, stale: u64) -> Result<()> {
        let mut guard = self.session.write().await;
        if guard.as_ref().is_some_and(|s| s.generation != stale) {
            debug!("Session already refreshed by another request");
            return Ok(());
        }
        *guard = Some(self.perform_login().await?);
        Ok(())
    }

    async fn dispatch(&self, session: &Session, spec: &RequestSpec) -> Result<Response> {
        let mut url = match &spec.target {
            Target::Path(path) => session.api_host.join(path)?,
            Target::Absolute(url) => url.clone(),
        };
        if matches!(spec.target, Target::Path(_)) {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &spec.query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("A", &session.token);
        }

        let start = Instant::now();
        let response = self
            .client
            .request(spec.method.clone(), url)
            .bearer_auth(&session.token)
            .send()
            .await?;

        debug!(
            status = %response.status(),
            elapsed_ms = start.elapsed().as_millis(),
            "Response headers received"
        );
        Ok(response)
    }

    async fn perform_login(&self) -> Result<Session> {
        debug!("Making authentication request");
        let start = Instant::now();
        let response = self
            .client
            .post(self.login_url.join(AUTHENTICATE_PATH)?)
            .header("Authentication", &self.credentials.auth_token)
            .form(&[
                ("username", self.credentials.email.as_str()),
                ("password", self.credentials.password_or_empty()),
            ])
            .send()
            .await?;
        debug!(elapsed_ms = start.elapsed().as_millis(), "Authentication request took");

        if response.status() != StatusCode::OK {
            return Err(Error::Auth(format!(
                "Authentication failed with code {}",
                response.status().as_u16()
            )));
        }
        let challenge: serde_json::Map<String, Value> = serde_json::from_slice(&response.bytes().await?)
            .map_err(|e| Error::Auth(format!("Malformed authentication response: {e}")))?;

        debug!("Making authorize request");
        let start = Instant::now();
        let form: Vec<(String, String)> = challenge
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();
        let response = self
            .client
            .post(self.login_url.join(AUTHORIZE_PATH)?)
            .header("Authentication", &self.credentials.auth_token)
            .form(&form)
            .send()
            .await?;
        debug!(elapsed_ms = start.elapsed().as_millis(), "Authorize request took");

        if response.status() != StatusCode::OK {
            return Err(Error::Auth(format!(
                "Authorization failed with code {}",
                response.status().as_u16()
            )));
        }

        let cookie_token = response
            .cookies()
            .find(|c| c.name() == AUTH_KEY)
            .map(|c| c.value().to_string());
        let body: Option<Value> = serde_json::from_slice(&response.bytes().await?).ok();

        let token = cookie_token
            .or_else(|| {
                body.as_ref()
                    .and_then(|b| b.get(AUTH_KEY))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Auth("Authorize response carried no auth_key".to_string()))?;

        let api_host = match body
            .as_ref()
            .and_then(|b| b.get("active_brand_subdomain"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            Some(subdomain) => Url::parse(&format!("https://{subdomain}.eagleeyenetworks.com"))?,
            None => self
                .api_host_override
                .clone()
                .unwrap_or_else(|| self.login_url.clone()),
        };

        self.logins.fetch_add(1, Ordering::SeqCst);
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(host = %api_host, "Logged in");

        Ok(Session {
            token,
            api_host,
            generation,
        })
    }
}
