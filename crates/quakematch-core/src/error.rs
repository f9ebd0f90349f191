//! Detection engine error types.

use thiserror::Error;

/// Result type for detection engine operations.
pub type DetectResult<T> = Result<T, DetectError>;

/// Errors surfaced by the detection engine.
///
/// Configuration errors are raised at build time and are fatal to the
/// detector being constructed. Data inconsistencies (sampling-frequency
/// changes, out-of-order records, intolerable gaps) are handled locally by
/// resetting the affected stream state and never surface as errors; they
/// are observable through logs and counters only. Degenerate computations
/// (zero variance in a correlation window) define the coefficient as 0 and
/// raise nothing.
#[derive(Error, Debug)]
pub enum DetectError {
    /// Invalid configuration; the detector refuses to start.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Stream data could not be consumed as delivered.
    #[error("{stream_id}: {reason}")]
    DataInconsistency { stream_id: String, reason: String },

    /// A match result was fed for a processor id the linker does not know.
    #[error("unknown template processor id: {0}")]
    UnknownProcessor(String),

    /// Pick-offset-table dimensions or entries do not line up.
    #[error("pick offset table mismatch: {0}")]
    PotMismatch(String),
}

impl DetectError {
    /// Whether the engine remains usable after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DetectError::DataInconsistency { .. } | DetectError::UnknownProcessor(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(!DetectError::Config("bad threshold".into()).is_recoverable());
        assert!(DetectError::UnknownProcessor("tpl-9".into()).is_recoverable());
        assert!(DetectError::DataInconsistency {
            stream_id: "CH.SULZ..HHZ".into(),
            reason: "gap".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = DetectError::DataInconsistency {
            stream_id: "CH.SULZ..HHZ".into(),
            reason: "sampling frequency changed".into(),
        };
        assert_eq!(err.to_string(), "CH.SULZ..HHZ: sampling frequency changed");
    }
}
