mod latency;
mod output;
mod stream;

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use dialoguer::Password;

use eeprobe::{AuthSession, Config, Credentials};

pub use latency::cmd_latency;
pub use stream::cmd_stream;

pub fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("Could not load config {}", path.display()))
}

/// Prompt for a missing password and log in; any failure here is fatal.
async fn connect(config: &Config) -> Result<Arc<AuthSession>> {
    let mut credentials = config.credentials();
    let interactive = std::io::stdin().is_terminal();
    fill_password(
        &mut credentials,
        interactive,
        &mut std::io::stdin().lock(),
        &mut std::io::stderr(),
    )
    .context("Could not read password")?;

    let auth = AuthSession::from_config(config, credentials)?;
    auth.login().await.context("Could not log in")?;
    Ok(Arc::new(auth))
}

/// On a terminal the password is read without echo; piped input falls back to a plain line.
fn fill_password<R: BufRead, W: Write>(
    credentials: &mut Credentials,
    interactive: bool,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    if credentials.password.is_some() {
        return Ok(());
    }

    if interactive {
        let password = Password::new()
            .with_prompt("Please enter Eagle Eye password")
            .interact()?;
        credentials.password = Some(password);
        return Ok(());
    }

    credentials.resolve_password(input, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn credentials(password: Option<&str>) -> Credentials {
        Credentials {
            email: "ops@example.com".to_string(),
            password: password.map(str::to_string),
            auth_token: "key".to_string(),
        }
    }

    #[test]
    fn piped_input_reads_password_from_reader() {
        let mut creds = credentials(None);
        let mut input = Cursor::new("hunter2\n");
        let mut output = Vec::new();

        fill_password(&mut creds, false, &mut input, &mut output).unwrap();

        assert_eq!(creds.password.as_deref(), Some("hunter2"));
        assert!(String::from_utf8(output).unwrap().contains("password"));
    }

    #[test]
    fn configured_password_skips_every_prompt() {
        let mut creds = credentials(Some("from-config"));
        let mut input = Cursor::new("");
        let mut output = Vec::new();

        // Terminal path must not be touched either
        fill_password(&mut creds, true, &mut input, &mut output).unwrap();

        assert_eq!(creds.password.as_deref(), Some("from-config"));
        assert!(output.is_empty());
    }

    #[test]
    fn empty_piped_password_is_rejected() {
        let mut creds = credentials(None);
        let mut input = Cursor::new("\n");
        let mut output = Vec::new();

        let err = fill_password(&mut creds, false, &mut input, &mut output).unwrap_err();
        assert!(err.to_string().contains("No password"));
    }
}
