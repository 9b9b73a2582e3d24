//! Error types for the sampling engine.
//!
//! Every fatal condition a run can hit is one variant of [`BenchError`].
//! Arithmetic overflow during summation is deliberately absent: it is a
//! non-fatal diagnostic recorded on the statistics themselves (see
//! [`crate::stats::CheckedSum`]).

use thiserror::Error;

/// Fatal errors surfaced by `run`, `percentile_run` and the control surface.
#[derive(Error, Debug)]
pub enum BenchError {
    /// The run configuration or a percentile request was rejected before
    /// any allocation took place.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A sample buffer or retainer backing store could not be allocated.
    #[error("failed to allocate {what} ({len} elements)")]
    AllocationFailure { what: &'static str, len: usize },

    /// The worker lifecycle primitive could not start a worker.
    #[error("failed to start worker for unit {unit}: {source}")]
    WorkerRegistration {
        unit: usize,
        #[source]
        source: std::io::Error,
    },

    /// A worker terminated abnormally (its thread panicked).
    #[error("worker for unit {unit} terminated abnormally")]
    WorkerFailed { unit: usize },

    /// Order statistics were requested over an empty sample set.
    #[error("cannot compute statistics over an empty sample set")]
    EmptySampleSet,
}

impl BenchError {
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Convenience alias used across the library.
pub type Result<T, E = BenchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BenchError::invalid_config("sample count cannot be zero");
        assert_eq!(
            err.to_string(),
            "invalid configuration: sample count cannot be zero"
        );

        let err = BenchError::AllocationFailure {
            what: "sample buffer",
            len: 10,
        };
        assert_eq!(
            err.to_string(),
            "failed to allocate sample buffer (10 elements)"
        );
    }

    #[test]
    fn test_registration_error_keeps_source() {
        use std::error::Error as _;

        let err = BenchError::WorkerRegistration {
            unit: 3,
            source: std::io::Error::new(std::io::ErrorKind::Other, "no threads left"),
        };
        assert!(err.to_string().contains("unit 3"));
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("no threads left"));
    }
}
