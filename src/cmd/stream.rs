use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use eeprobe::{Config, ContinuousReader, LiveStreamOpener, ReaderSettings};

use super::output::format_summary;

pub async fn cmd_stream(config: &Config, name: &str) -> Result<()> {
    let camera = config
        .camera(name)
        .with_context(|| format!("No such camera {name}"))?;

    let auth = super::connect(config).await?;
    let settings = ReaderSettings {
        slow_chunk_threshold: config.slow_chunk_threshold(),
        initial_backoff: config.open_retry_backoff(),
        ..ReaderSettings::default()
    };
    let reader = ContinuousReader::with_settings(Arc::new(LiveStreamOpener::new(auth)), settings);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    eprintln!("📡 Streaming {name}. Use Ctrl+C to stop.");
    let summary = reader.run(&camera, &cancel).await;

    println!("{}", format_summary(name, &summary));
    Ok(())
}

/// First Ctrl+C stops after the read in flight; a second one exits at once.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("\n🛑 Stopping streaming (Ctrl+C again to force)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
