use std::sync::Arc;

use anyhow::Result;

use eeprobe::{Config, LatencyProber, LiveStreamOpener};

use super::output::format_report;

pub async fn cmd_latency(config: &Config, trials: u32) -> Result<()> {
    let cameras = config.cameras();
    let auth = super::connect(config).await?;
    let prober = LatencyProber::new(Arc::new(LiveStreamOpener::new(auth)));

    println!(
        "⏱️  Testing latency: {} cameras, {} trials each\n",
        cameras.len(),
        trials
    );

    let results = prober
        .run_trials(&cameras, trials, config.delay_between_runs())
        .await;

    print!("{}", format_report(&results.report()));

    Ok(())
}
