//! State shared between the append path, the periodic tasks and readers
//!
//! Every field has its own lock. The append path and the periodic tasks
//! never hold two of them at once: data is copied out, the lock released,
//! and results published under the destination lock afterwards.
//! Reconfiguration is the exception and nests locks in the fixed order
//! session, config, signal, detector.

use chrono::{DateTime, Utc};
use hrv_core::{CoherenceCurve, HrvResult, SampleStore, Spectrum};
use hrv_processing::{AnalysisConfig, BeatHistory, FilterStage, PeakDetector, RateHistory};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{trace, warn};
use uuid::Uuid;

/// Filter memory and the filtered sample window, updated together
#[derive(Debug)]
pub struct SignalState {
    pub filter: FilterStage,
    pub store: SampleStore,
}

impl SignalState {
    pub fn new(config: &AnalysisConfig) -> HrvResult<Self> {
        Ok(Self {
            filter: FilterStage::new(config.filters.clone(), config.sampling_rate)?,
            store: SampleStore::new(config.sampling_rate, config.window_seconds)?,
        })
    }
}

/// Completed cycles per periodic task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCounts {
    pub detection: u64,
    pub rate: u64,
    pub variability: u64,
    pub coherence: u64,
}

/// Monitor statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub is_running: bool,
    pub samples_appended: u64,
    pub chunks_rejected: u64,
    pub beats_detected: u64,
    pub cycles: CycleCounts,
    /// Cycles that ended in a non-transient error or a caught panic
    pub cycle_faults: u64,
}

#[derive(Debug)]
pub struct SharedState {
    pub signal: Mutex<SignalState>,
    pub detector: Mutex<PeakDetector>,
    pub beats: Mutex<BeatHistory>,
    pub rates: Mutex<RateHistory>,
    pub spectrum: Mutex<Option<Spectrum>>,
    pub coherence: Mutex<Option<CoherenceCurve>>,
    pub stats: Mutex<MonitorStats>,
}

impl SharedState {
    pub fn new(config: &AnalysisConfig) -> HrvResult<Self> {
        Ok(Self {
            signal: Mutex::new(SignalState::new(config)?),
            detector: Mutex::new(PeakDetector::new(config.detection.clone())?),
            beats: Mutex::new(BeatHistory::from_config(&config.detection)),
            rates: Mutex::new(RateHistory::new(config.rate.history_len)),
            spectrum: Mutex::new(None),
            coherence: Mutex::new(None),
            stats: Mutex::new(MonitorStats::default()),
        })
    }

    /// Filter a raw chunk and store it, returning the number of samples kept.
    /// Chunks with non-finite values are dropped whole.
    pub async fn append(&self, chunk: &[f64]) -> usize {
        if chunk.is_empty() {
            return 0;
        }
        if chunk.iter().any(|v| !v.is_finite()) {
            warn!(len = chunk.len(), "Dropping chunk with non-finite samples");
            self.stats.lock().await.chunks_rejected += 1;
            return 0;
        }

        let evicted = {
            let mut signal = self.signal.lock().await;
            let filtered = signal.filter.apply(chunk);
            signal.store.append(&filtered)
        };
        trace!(len = chunk.len(), evicted, "Appended chunk");

        self.stats.lock().await.samples_appended += chunk.len() as u64;
        chunk.len()
    }

    /// Clear everything a new session must not inherit and size the
    /// histories from `config`. Filter memory is kept.
    pub async fn reset_session(
        &self,
        config: &AnalysisConfig,
        session_id: Uuid,
        started_at: DateTime<Utc>,
    ) {
        self.signal.lock().await.store.reset();
        *self.beats.lock().await = BeatHistory::from_config(&config.detection);
        *self.rates.lock().await = RateHistory::new(config.rate.history_len);
        *self.spectrum.lock().await = None;
        *self.coherence.lock().await = None;
        *self.stats.lock().await = MonitorStats {
            session_id: Some(session_id),
            started_at: Some(started_at),
            is_running: true,
            ..MonitorStats::default()
        };
    }
}
