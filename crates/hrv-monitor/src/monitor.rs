//! HRV monitor runtime: append path, session lifecycle and read access

use crate::state::{MonitorStats, SharedState, SignalState};
use crate::tasks::{run_periodic, Job};
use chrono::{DateTime, Utc};
use hrv_core::{CoherenceCurve, HrvError, HrvResult, SampleSnapshot, Spectrum};
use hrv_processing::{
    AnalysisConfig, BeatHistory, ButterworthParams, CoherenceScorer, NotchParams, PeakDetector,
    RateEstimator, RateHistory, VariabilityAnalyzer,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    shutdown: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

/// Streaming heart rate variability monitor.
///
/// Raw chunks go in through [`HrvMonitor::append`]; while a session is
/// running four periodic tasks turn the filtered window into beats, a heart
/// rate, a variability spectrum and a coherence score. Getters return
/// copies and never block the tasks for longer than one clone.
pub struct HrvMonitor {
    config: Mutex<AnalysisConfig>,
    shared: Arc<SharedState>,
    session: Mutex<Option<Session>>,
}

impl HrvMonitor {
    pub fn new(config: AnalysisConfig) -> HrvResult<Self> {
        config.validate()?;
        let shared = SharedState::new(&config)?;
        Ok(Self {
            config: Mutex::new(config),
            shared: Arc::new(shared),
            session: Mutex::new(None),
        })
    }

    /// Filter and store a raw chunk. Returns the number of samples stored;
    /// chunks containing NaN or infinity are dropped whole.
    pub async fn append(&self, chunk: &[f64]) -> usize {
        self.shared.append(chunk).await
    }

    /// Start a new session.
    ///
    /// Clears the sample window and every derived output, then spawns the
    /// detection, rate, variability and coherence tasks. Filter memory is
    /// carried over.
    pub async fn start(&self) -> HrvResult<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(HrvError::AlreadyRunning);
        }

        let config = self.config.lock().await.clone();
        let jobs = [
            (Job::Detection, config.schedule.detection_period()),
            (
                Job::Rate(RateEstimator::new(config.rate.clone())?),
                config.schedule.rate_period(),
            ),
            (
                Job::Variability {
                    analyzer: VariabilityAnalyzer::new(config.variability.clone())?,
                    sampling_rate: config.sampling_rate,
                },
                config.schedule.variability_period(),
            ),
            (
                Job::Coherence(CoherenceScorer::new(config.coherence.clone())?),
                config.schedule.coherence_period(),
            ),
        ];

        let id = Uuid::new_v4();
        let started_at = Utc::now();
        self.shared.reset_session(&config, id, started_at).await;
        let filters = self.shared.signal.lock().await.filter.names().join(" -> ");

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();
        for (job, period) in jobs {
            tasks.spawn(run_periodic(
                job,
                period,
                Arc::clone(&self.shared),
                shutdown_rx.clone(),
                id,
            ));
        }

        info!(session = %id, %started_at, %filters, "HRV monitor started");
        *session = Some(Session {
            id,
            started_at,
            shutdown,
            tasks,
        });
        Ok(())
    }

    /// Stop the running session and wait for its tasks. Idempotent.
    pub async fn stop(&self) -> HrvResult<()> {
        let mut guard = self.session.lock().await;
        let Some(mut session) = guard.take() else {
            debug!("Stop requested while idle");
            return Ok(());
        };

        // Receivers may already be gone if every task exited
        let _ = session.shutdown.send(true);
        while let Some(joined) = session.tasks.join_next().await {
            if let Err(e) = joined {
                error!(session = %session.id, error = %e, "Task ended abnormally");
            }
        }

        self.shared.stats.lock().await.is_running = false;
        let elapsed = Utc::now() - session.started_at;
        info!(
            session = %session.id,
            elapsed_s = elapsed.num_milliseconds() as f64 / 1000.0,
            "HRV monitor stopped"
        );
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Feed the append path from a chunk broadcast for the rest of the
    /// session. Lagged chunks are skipped with a warning.
    pub async fn spawn_ingest(&self, mut receiver: broadcast::Receiver<Vec<f64>>) -> HrvResult<()> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(HrvError::NotRunning)?;

        let shared = Arc::clone(&self.shared);
        let mut shutdown = session.shutdown.subscribe();
        let span = info_span!("ingest", session = %session.id);

        session.tasks.spawn(
            async move {
                loop {
                    tokio::select! {
                        received = receiver.recv() => match received {
                            Ok(chunk) => {
                                shared.append(&chunk).await;
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(skipped, "Ingest fell behind the source");
                            }
                            Err(RecvError::Closed) => {
                                debug!("Source closed");
                                break;
                            }
                        },
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
            }
            .instrument(span),
        );
        Ok(())
    }

    /// Replace the configuration.
    ///
    /// Filter and detection settings apply immediately and reset filter
    /// memory; a new beat history length takes effect at the next `start`.
    /// Sampling rate, window length, rate, variability, coherence and
    /// schedule settings can only change while stopped.
    pub async fn configure(&self, config: AnalysisConfig) -> HrvResult<()> {
        config.validate()?;
        let session = self.session.lock().await;
        let mut current = self.config.lock().await;

        let rebuild_store = config.sampling_rate != current.sampling_rate
            || config.window_seconds != current.window_seconds;
        if session.is_some() {
            if rebuild_store {
                return Err(hrv_core::analysis_error!(
                    "sampling rate and window can only change while stopped"
                ));
            }
            if config.rate != current.rate
                || config.variability != current.variability
                || config.coherence != current.coherence
                || config.schedule != current.schedule
            {
                return Err(hrv_core::analysis_error!(
                    "analysis and schedule settings can only change while stopped"
                ));
            }
        }

        let detector = PeakDetector::new(config.detection.clone())?;
        if rebuild_store {
            *self.shared.signal.lock().await = SignalState::new(&config)?;
        } else {
            self.shared
                .signal
                .lock()
                .await
                .filter
                .configure(config.filters.clone())?;
        }
        *self.shared.detector.lock().await = detector;

        if session.is_none() {
            *self.shared.beats.lock().await = BeatHistory::from_config(&config.detection);
            *self.shared.rates.lock().await = RateHistory::new(config.rate.history_len);
        }

        info!(
            sampling_rate = config.sampling_rate,
            window_seconds = config.window_seconds,
            "Configuration updated"
        );
        *current = config;
        Ok(())
    }

    pub async fn configure_highpass(&self, params: ButterworthParams) -> HrvResult<()> {
        let mut config = self.config.lock().await;
        self.shared.signal.lock().await.filter.configure_highpass(params)?;
        config.filters.highpass = params;
        debug!(cutoff_hz = params.cutoff_hz, order = params.order, "Highpass updated");
        Ok(())
    }

    pub async fn configure_lowpass(&self, params: ButterworthParams) -> HrvResult<()> {
        let mut config = self.config.lock().await;
        self.shared.signal.lock().await.filter.configure_lowpass(params)?;
        config.filters.lowpass = params;
        debug!(cutoff_hz = params.cutoff_hz, order = params.order, "Lowpass updated");
        Ok(())
    }

    pub async fn configure_notch(&self, params: NotchParams) -> HrvResult<()> {
        let mut config = self.config.lock().await;
        self.shared.signal.lock().await.filter.configure_notch(params)?;
        config.filters.notch = params;
        debug!(frequency_hz = params.frequency_hz, quality = params.quality, "Notch updated");
        Ok(())
    }

    pub async fn config(&self) -> AnalysisConfig {
        self.config.lock().await.clone()
    }

    /// Filtered samples currently in the window, oldest first
    pub async fn get_waveform(&self) -> SampleSnapshot {
        self.shared.signal.lock().await.store.snapshot()
    }

    /// Beat times and prominences
    pub async fn get_beats(&self) -> (Vec<f64>, Vec<f64>) {
        self.shared.beats.lock().await.beat_series()
    }

    /// RR intervals in seconds, oldest first
    pub async fn get_rr_intervals(&self) -> Vec<f64> {
        self.shared.beats.lock().await.intervals()
    }

    /// Heart rate estimates in BPM, oldest first
    pub async fn get_rate_history(&self) -> Vec<f64> {
        self.shared.rates.lock().await.values()
    }

    pub async fn get_spectrum(&self) -> Option<Spectrum> {
        self.shared.spectrum.lock().await.clone()
    }

    pub async fn get_coherence(&self) -> Option<CoherenceCurve> {
        self.shared.coherence.lock().await.clone()
    }

    pub async fn stats(&self) -> MonitorStats {
        self.shared.stats.lock().await.clone()
    }

    /// Run one cycle of every task in order, outside any session.
    ///
    /// Errors that a periodic task would skip are returned here.
    pub async fn run_cycles_once(&self) -> Vec<HrvResult<()>> {
        let config = self.config.lock().await.clone();
        let mut jobs: Vec<Job> = vec![Job::Detection];
        match RateEstimator::new(config.rate.clone()) {
            Ok(estimator) => jobs.push(Job::Rate(estimator)),
            Err(e) => return vec![Err(e)],
        }
        match VariabilityAnalyzer::new(config.variability.clone()) {
            Ok(analyzer) => jobs.push(Job::Variability {
                analyzer,
                sampling_rate: config.sampling_rate,
            }),
            Err(e) => return vec![Err(e)],
        }
        match CoherenceScorer::new(config.coherence.clone()) {
            Ok(scorer) => jobs.push(Job::Coherence(scorer)),
            Err(e) => return vec![Err(e)],
        }

        let mut results = Vec::with_capacity(jobs.len());
        for mut job in jobs {
            results.push(job.run_cycle(&self.shared).await);
        }
        results
    }
}
