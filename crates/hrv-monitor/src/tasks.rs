//! The four periodic analysis tasks
//!
//! Each cycle copies its inputs under one lock, computes without holding any
//! lock, then publishes under the destination lock.

use crate::state::SharedState;
use hrv_core::{HrvError, HrvResult};
use hrv_processing::{CoherenceScorer, RateEstimator, VariabilityAnalyzer};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info_span, trace, Instrument};
use uuid::Uuid;

/// One periodic analysis job and the estimator state it owns
#[derive(Debug)]
pub enum Job {
    Detection,
    Rate(RateEstimator),
    Variability {
        analyzer: VariabilityAnalyzer,
        sampling_rate: f64,
    },
    Coherence(CoherenceScorer),
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Detection => "detection",
            Job::Rate(_) => "rate",
            Job::Variability { .. } => "variability",
            Job::Coherence(_) => "coherence",
        }
    }

    /// Run a single cycle against the shared state
    pub async fn run_cycle(&mut self, shared: &SharedState) -> HrvResult<()> {
        let task = self.name();
        match self {
            Job::Detection => {
                let snapshot = shared.signal.lock().await.store.snapshot();
                let detector = shared.detector.lock().await.clone();
                let last_beat = shared.beats.lock().await.last_beat_time();

                let found = guarded(task, || Ok(detector.scan(&snapshot, last_beat)))?;
                if found.is_empty() {
                    trace!("No new beats");
                    return Ok(());
                }

                let accepted = shared.beats.lock().await.record(&found);
                shared.stats.lock().await.beats_detected += accepted as u64;
                debug!(found = found.len(), accepted, "Recorded beats");
            }

            Job::Rate(estimator) => {
                let window = estimator.window();
                let recent = shared.beats.lock().await.recent_intervals(window);

                let bpm = guarded(task, || estimator.estimate(&recent))?;
                shared.rates.lock().await.push(bpm);
                debug!(bpm, intervals = recent.len(), "Rate updated");
            }

            Job::Variability {
                analyzer,
                sampling_rate,
            } => {
                let (times, intervals) = shared.beats.lock().await.aligned_intervals();
                let fs = *sampling_rate;

                let spectrum = guarded(task, || analyzer.analyze(&times, &intervals, fs))?;
                debug!(bins = spectrum.len(), intervals = intervals.len(), "Spectrum updated");
                *shared.spectrum.lock().await = Some(spectrum);
            }

            Job::Coherence(scorer) => {
                let Some(spectrum) = shared.spectrum.lock().await.clone() else {
                    trace!("No spectrum yet");
                    return Ok(());
                };

                let curve = guarded(task, || scorer.evaluate(&spectrum))?;
                debug!(value = curve.value, "Coherence updated");
                *shared.coherence.lock().await = Some(curve);
            }
        }
        Ok(())
    }

    async fn count_cycle(&self, shared: &SharedState) {
        let mut stats = shared.stats.lock().await;
        match self {
            Job::Detection => stats.cycles.detection += 1,
            Job::Rate(_) => stats.cycles.rate += 1,
            Job::Variability { .. } => stats.cycles.variability += 1,
            Job::Coherence(_) => stats.cycles.coherence += 1,
        }
    }
}

/// Run `compute`, turning a panic into `TaskFailed`
fn guarded<T>(task: &'static str, compute: impl FnOnce() -> HrvResult<T>) -> HrvResult<T> {
    catch_unwind(AssertUnwindSafe(compute)).unwrap_or_else(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(HrvError::TaskFailed { task, reason })
    })
}

/// Run `job` every `period` until the shutdown flag is raised
pub async fn run_periodic(
    mut job: Job,
    period: Duration,
    shared: Arc<SharedState>,
    mut shutdown: watch::Receiver<bool>,
    session: Uuid,
) {
    let span = info_span!("task", name = job.name(), %session);

    async move {
        debug!(period_ms = period.as_millis() as u64, "Task started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            match job.run_cycle(&shared).await {
                Ok(()) => {}
                Err(e) if e.is_transient() => trace!(reason = %e, "Skipped cycle"),
                Err(e) => {
                    error!(error = %e, "Cycle failed");
                    shared.stats.lock().await.cycle_faults += 1;
                }
            }
            job.count_cycle(&shared).await;

            tokio::select! {
                _ = sleep(period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Task stopped");
    }
    .instrument(span)
    .await
}
