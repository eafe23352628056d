//! Error handling for the HRV pipeline
//!
//! One error type shared by every crate in the workspace. Insufficient data is
//! modelled here too, but the periodic tasks treat it as a quiet no-op rather
//! than a failure.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type HrvResult<T> = Result<T, HrvError>;

/// Error type for all pipeline operations
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum HrvError {
    /// A filter stage was configured with unusable parameters
    #[error("Invalid {stage} filter configuration: {reason}")]
    InvalidFilterConfig {
        /// Stage name (highpass, lowpass, notch)
        stage: &'static str,
        /// Description of the problem
        reason: String,
    },

    /// Sampling rate is not positive and finite
    #[error("Invalid sampling rate: {rate}Hz")]
    InvalidSamplingRate {
        /// Provided sampling rate
        rate: f64,
    },

    /// Peak detection thresholds are inconsistent
    #[error("Invalid detection configuration: {reason}")]
    InvalidDetectionConfig {
        /// Description of the problem
        reason: String,
    },

    /// Spectral, rate or coherence settings are inconsistent
    #[error("Invalid analysis configuration: {reason}")]
    InvalidAnalysisConfig {
        /// Description of the problem
        reason: String,
    },

    /// Not enough input to run a computation
    #[error("Insufficient data: needed {needed}, available {available}")]
    InsufficientData {
        /// Minimum amount required
        needed: usize,
        /// Amount actually available
        available: usize,
    },

    /// A computation hit a division by zero or a non-finite intermediate
    #[error("Numeric degeneracy: {reason}")]
    NumericDegeneracy {
        /// Description of the degenerate case
        reason: &'static str,
    },

    /// `start()` called while the monitor is already running
    #[error("Monitor is already running")]
    AlreadyRunning,

    /// Operation requires a running monitor
    #[error("Monitor is not running")]
    NotRunning,

    /// Configuration file could not be read or parsed
    #[error("Configuration I/O error: {reason}")]
    ConfigIo {
        /// Underlying I/O or parse message
        reason: String,
    },

    /// Synthetic signal generator settings are unusable
    #[error("Simulation error: {reason}")]
    Simulation {
        /// Description of the problem
        reason: String,
    },

    /// A background task ended abnormally
    #[error("Task {task} failed: {reason}")]
    TaskFailed {
        /// Task name
        task: &'static str,
        /// Failure description
        reason: String,
    },
}

impl HrvError {
    /// True for the expected steady-state outcomes that a periodic cycle
    /// should swallow and retry on its next period.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HrvError::InsufficientData { .. } | HrvError::NumericDegeneracy { .. }
        )
    }
}

/// Convenience macro for creating analysis configuration errors
#[macro_export]
macro_rules! analysis_error {
    ($($arg:tt)+) => {
        $crate::error::HrvError::InvalidAnalysisConfig {
            reason: format!($($arg)+)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = HrvError::InvalidFilterConfig {
            stage: "highpass",
            reason: "cutoff 300Hz must be below Nyquist 250Hz".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("highpass"));
        assert!(display.contains("300Hz"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(HrvError::InsufficientData { needed: 10, available: 3 }.is_transient());
        assert!(HrvError::NumericDegeneracy { reason: "zero denominator" }.is_transient());
        assert!(!HrvError::AlreadyRunning.is_transient());
        assert!(!analysis_error!("bad band {}", 1).is_transient());
    }
}
