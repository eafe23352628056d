//! Real-time ECG chunk streaming, standing in for an acquisition device

use crate::beat_patterns::BeatPattern;
use crate::ecg_simulator::{EcgConfig, EcgSimulator};
use hrv_core::{HrvError, HrvResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for real-time streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// ECG simulation configuration
    pub ecg: EcgConfig,
    /// Samples per emitted chunk
    pub chunk_samples: usize,
    /// Broadcast buffer size in chunks
    pub buffer_size: usize,
    /// Playback speed relative to real time
    pub speedup: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ecg: EcgConfig::default(),
            chunk_samples: 16,
            buffer_size: 256,
            speedup: 1.0,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> HrvResult<()> {
        self.ecg.validate()?;
        if self.chunk_samples == 0 || self.buffer_size == 0 {
            return Err(HrvError::Simulation {
                reason: "chunk size and buffer size must be positive".to_string(),
            });
        }
        if !(self.speedup.is_finite() && self.speedup > 0.0) {
            return Err(HrvError::Simulation {
                reason: format!("invalid speedup {}", self.speedup),
            });
        }
        Ok(())
    }

    /// Wall-clock time between chunks
    pub fn chunk_period(&self) -> Duration {
        Duration::from_secs_f64(
            self.chunk_samples as f64 / self.ecg.sampling_rate / self.speedup,
        )
    }
}

/// Commands for controlling the stream
#[derive(Debug, Clone)]
pub enum StreamCommand {
    Start,
    Stop,
    UpdateConfig(StreamConfig),
    UpdatePattern(BeatPattern),
}

/// Stream statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_running: bool,
    pub chunks_generated: u64,
    pub samples_generated: u64,
    /// Seconds of signal emitted since the last start
    pub signal_time: f64,
    pub average_chunk_micros: f64,
}

/// Real-time ECG signal stream
pub struct RealTimeEcgStream {
    config: StreamConfig,
    simulator: Arc<Mutex<EcgSimulator>>,
    data_sender: broadcast::Sender<Vec<f64>>,
    control_receiver: mpsc::Receiver<StreamCommand>,
    control_sender: Option<mpsc::Sender<StreamCommand>>,
    stats: Arc<Mutex<StreamStats>>,
}

impl RealTimeEcgStream {
    /// Create new real-time ECG stream
    pub fn new(config: StreamConfig) -> HrvResult<Self> {
        config.validate()?;
        let simulator = EcgSimulator::new(config.ecg.clone())?;
        let (data_sender, _) = broadcast::channel(config.buffer_size);
        let (control_sender, control_receiver) = mpsc::channel(32);

        Ok(RealTimeEcgStream {
            config,
            simulator: Arc::new(Mutex::new(simulator)),
            data_sender,
            control_receiver,
            control_sender: Some(control_sender),
            stats: Arc::new(Mutex::new(StreamStats::default())),
        })
    }

    /// Get a receiver for data updates
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<f64>> {
        self.data_sender.subscribe()
    }

    /// Get control sender for sending commands; `None` once `run` has begun
    pub fn control_handle(&self) -> Option<mpsc::Sender<StreamCommand>> {
        self.control_sender.clone()
    }

    /// Shared statistics handle, readable while `run` is active
    pub fn stats_handle(&self) -> Arc<Mutex<StreamStats>> {
        Arc::clone(&self.stats)
    }

    /// Drive the stream until every control handle is dropped
    pub async fn run(&mut self) -> HrvResult<()> {
        self.control_sender = None;
        let mut interval_timer = interval(self.config.chunk_period());
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut running = false;

        info!(
            chunk_samples = self.config.chunk_samples,
            period_ms = self.config.chunk_period().as_secs_f64() * 1000.0,
            "ECG stream ready"
        );

        loop {
            tokio::select! {
                _ = interval_timer.tick(), if running => {
                    let start_time = Instant::now();

                    let chunk = {
                        let mut sim = self.simulator.lock().await;
                        sim.generate_chunk(self.config.chunk_samples)
                    };

                    let generation_time = start_time.elapsed();
                    {
                        let mut stats = self.stats.lock().await;
                        stats.chunks_generated += 1;
                        stats.samples_generated += chunk.len() as u64;
                        stats.signal_time = stats.samples_generated as f64 / self.config.ecg.sampling_rate;
                        let n = stats.chunks_generated as f64;
                        stats.average_chunk_micros +=
                            (generation_time.as_secs_f64() * 1e6 - stats.average_chunk_micros) / n;
                    }

                    // No subscribers is not an error
                    let _ = self.data_sender.send(chunk);

                    if generation_time > self.config.chunk_period() {
                        warn!(
                            generation_us = generation_time.as_micros() as u64,
                            "Chunk generation slower than the chunk period"
                        );
                    }
                }

                command = self.control_receiver.recv() => {
                    match command {
                        Some(StreamCommand::Start) => {
                            running = true;
                            interval_timer.reset();
                            self.stats.lock().await.is_running = true;
                            info!("ECG stream started");
                        }
                        Some(StreamCommand::Stop) => {
                            running = false;
                            {
                                let mut stats = self.stats.lock().await;
                                *stats = StreamStats::default();
                            }
                            self.simulator.lock().await.reset_time();
                            info!("ECG stream stopped");
                        }
                        Some(StreamCommand::UpdateConfig(new_config)) => {
                            if let Err(e) = self.apply_config(new_config).await {
                                warn!(error = %e, "Rejected stream configuration");
                                continue;
                            }
                            interval_timer = interval(self.config.chunk_period());
                            interval_timer.set_missed_tick_behavior(MissedTickBehavior::Burst);
                            debug!("ECG stream configuration updated");
                        }
                        Some(StreamCommand::UpdatePattern(pattern)) => {
                            let mut config = self.config.clone();
                            config.ecg.pattern = pattern;
                            match self.apply_config(config).await {
                                Ok(()) => info!(pattern = pattern.description(), "ECG stream pattern updated"),
                                Err(e) => warn!(error = %e, "Rejected beat pattern"),
                            }
                        }
                        None => {
                            debug!("ECG stream control channel closed");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn apply_config(&mut self, config: StreamConfig) -> HrvResult<()> {
        config.validate()?;
        self.simulator
            .lock()
            .await
            .update_config(config.ecg.clone())?;
        self.config = config;
        Ok(())
    }

    /// Get current stream statistics
    pub async fn stats(&self) -> StreamStats {
        self.stats.lock().await.clone()
    }

    /// Get current configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

/// Helper function to create and start a stream in the background
pub fn start_ecg_stream(
    config: StreamConfig,
) -> HrvResult<(broadcast::Receiver<Vec<f64>>, mpsc::Sender<StreamCommand>)> {
    let mut stream = RealTimeEcgStream::new(config)?;
    let data_receiver = stream.subscribe();
    let control_sender = stream.control_handle().ok_or_else(|| HrvError::Simulation {
        reason: "stream is already running".to_string(),
    })?;

    tokio::spawn(async move {
        if let Err(e) = stream.run().await {
            warn!(error = %e, "ECG stream ended with an error");
        }
    });

    Ok((data_receiver, control_sender))
}
