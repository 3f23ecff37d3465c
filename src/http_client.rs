//! HTTP client tuned for timing measurements
//!
//! Features:
//! - TLS 1.3 via rustls
//! - No idle connection reuse, so every probe pays the same setup cost
//! - TCP_NODELAY for prompt first bytes
//! - Redirects handled by the caller (credentials must survive host hops)
//! - No overall request timeout; live streams never finish on their own

use std::time::Duration;

use reqwest::Client;

use crate::error::Result;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("eeprobe/", env!("CARGO_PKG_VERSION"));

/// Build the client shared by login and stream requests.
pub fn build_client(connect_timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        // ═══════════════════════════════════════════════════════════════
        // CONNECTIONS
        // ═══════════════════════════════════════════════════════════════
        // Fresh connection per request: pooled sockets would make later
        // trials look faster than the first one
        .pool_max_idle_per_host(0)
        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(60))
        .connect_timeout(connect_timeout)
        // ═══════════════════════════════════════════════════════════════
        // TLS
        // ═══════════════════════════════════════════════════════════════
        .use_rustls_tls()
        // ═══════════════════════════════════════════════════════════════
        // REDIRECTS
        // ═══════════════════════════════════════════════════════════════
        // reqwest drops Authorization on cross-host redirects, and the
        // platform redirects stream requests to the camera's host
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    Ok(client)
}
