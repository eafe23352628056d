//! Headless HRV monitor fed by the synthetic ECG stream
//!
//! Usage: `hrv-monitor [config.json]`. Set `RUST_LOG` to change verbosity.

use anyhow::Context;
use hrv_monitor::HrvMonitor;
use hrv_processing::AnalysisConfig;
use hrv_simulation::{BeatPattern, EcgConfig, RealTimeEcgStream, StreamCommand, StreamConfig};
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AnalysisConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load configuration from {path}"))?,
        None => AnalysisConfig::default(),
    };

    let (_, pattern) = BeatPattern::presets()
        .into_iter()
        .find(|(name, _)| *name == "Resonant Breathing")
        .unwrap_or(("Resting", BeatPattern::default()));
    let stream_config = StreamConfig {
        ecg: EcgConfig {
            sampling_rate: config.sampling_rate,
            pattern,
            powerline_hz: Some(config.filters.notch.frequency_hz),
            ..EcgConfig::default()
        },
        ..StreamConfig::default()
    };
    info!(pattern = pattern.description(), "Signal flow: ECG simulator -> HRV monitor");

    let monitor = HrvMonitor::new(config).context("Invalid analysis configuration")?;
    let mut stream = RealTimeEcgStream::new(stream_config).context("Invalid stream configuration")?;
    let chunks = stream.subscribe();
    let stream_stats = stream.stats_handle();
    let control = stream
        .control_handle()
        .context("ECG stream control already taken")?;
    tokio::spawn(async move {
        if let Err(e) = stream.run().await {
            warn!(error = %e, "ECG stream ended with an error");
        }
    });

    monitor.start().await?;
    monitor.spawn_ingest(chunks).await?;
    control
        .send(StreamCommand::Start)
        .await
        .context("ECG stream is not accepting commands")?;

    let mut report = interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = report.tick() => {
                let stats = monitor.stats().await;
                let streamed = stream_stats.lock().await.clone();
                let rate = monitor.get_rate_history().await.last().copied();
                let coherence = monitor.get_coherence().await.map(|c| c.value);
                info!(
                    beats = stats.beats_detected,
                    rate_bpm = ?rate,
                    coherence = ?coherence,
                    rejected = stats.chunks_rejected,
                    faults = stats.cycle_faults,
                    chunks = streamed.chunks_generated,
                    signal_time = streamed.signal_time,
                    "Monitor status"
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl-c")?;
                break;
            }
        }
    }

    let _ = control.send(StreamCommand::Stop).await;
    monitor.stop().await?;
    let summary = serde_json::to_string(&monitor.stats().await).context("Failed to encode stats")?;
    info!(%summary, "Session finished");
    Ok(())
}
