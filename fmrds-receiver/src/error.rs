//! Error taxonomy for the FM/RDS receiver.
//!
//! Shaped after `SystemError` / `IoError` / `AudioError` / `InvalidArgument`
//! from the original design: resource errors get their own variant so the
//! scheduler and CLI can classify failures without string-matching.

use thiserror::Error;

/// Top-level error type for the receiver.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// IO errors from file or device operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pipeline construction or scheduling failure.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// DSP kernel contract violation (programmer error, not a runtime fault).
    #[error("DSP error: {0}")]
    Dsp(#[from] DspError),

    /// RDS decoding-stack internal error (not a per-block decode failure;
    /// those are represented by `RdsDecodingStatus`, never raised).
    #[error("RDS error: {0}")]
    Rds(#[from] RdsError),

    /// Audio sink configuration or write failure (other than a recoverable
    /// underrun, which the sink resolves internally).
    #[error("audio sink error: {0}")]
    Audio(String),

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Shared leaf error type from `fmrds-common`.
    #[error(transparent)]
    Common(#[from] fmrds_common::Error),

    /// Catch-all for external-collaborator failures (tuner, audio sink,
    /// file I/O) that don't have a dedicated variant.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Errors from the dataflow pipeline/scheduler (§4.4, §7).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The run completed but no output port ever reported EOF.
    #[error("pipeline stalled: no sink reached EOF")]
    Stalled,

    /// A filter's `process()` panicked or returned an error; captured as the
    /// scheduler's `last_exception` and re-raised from `stop()`/`run()`.
    #[error("block '{block}' failed: {reason}")]
    BlockFailed { block: String, reason: String },

    /// `connect()` type or cardinality mismatch, or a port required by a
    /// filter was never wired.
    #[error("invalid wiring: {reason}")]
    InvalidWiring { reason: String },

    /// `reset()` called while the pipeline was not `Paused`.
    #[error("reset() is only legal from the Paused state, was {state}")]
    ResetNotPaused { state: &'static str },
}

/// Programmer-error contract violations in a DSP kernel (§4.1, §4.5, §7).
#[derive(Debug, Error)]
pub enum DspError {
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Levinson-Durbin solver: Toeplitz system is singular")]
    SingularSystem,
}

/// Internal RDS-stack error (state-mutex poisoning etc). Block-level decode
/// outcomes are never errors; see `RdsDecodingStatus`.
#[derive(Debug, Error)]
pub enum RdsError {
    #[error("RDS state lock poisoned")]
    StatePoisoned,
}

/// Result type alias using the receiver's error type.
pub type Result<T> = std::result::Result<T, ReceiverError>;

/// Recovery classification, mirroring the reference error taxonomy's
/// distinction between transient and fatal failures.
#[derive(Debug, Clone, Copy)]
pub enum RecoveryStrategy {
    Retry { max_attempts: u32, delay_ms: u64 },
    Skip,
    LogAndContinue,
    Fatal,
}

impl ReceiverError {
    /// Recommended recovery strategy for this error.
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            ReceiverError::Io(_) => RecoveryStrategy::Retry {
                max_attempts: 3,
                delay_ms: 1000,
            },
            ReceiverError::Audio(_) => RecoveryStrategy::Fatal,
            ReceiverError::Pipeline(PipelineError::Stalled) => RecoveryStrategy::LogAndContinue,
            ReceiverError::Pipeline(PipelineError::BlockFailed { .. }) => RecoveryStrategy::Fatal,
            ReceiverError::Dsp(_) => RecoveryStrategy::Fatal,
            ReceiverError::Rds(_) => RecoveryStrategy::LogAndContinue,
            _ => RecoveryStrategy::LogAndContinue,
        }
    }

    /// Stable error code for logs/CLI exit diagnostics.
    pub fn error_code(&self) -> &'static str {
        match self {
            ReceiverError::Io(_) => "FM_IO_001",
            ReceiverError::Pipeline(e) => match e {
                PipelineError::Stalled => "FM_PL_001",
                PipelineError::BlockFailed { .. } => "FM_PL_002",
                PipelineError::InvalidWiring { .. } => "FM_PL_003",
                PipelineError::ResetNotPaused { .. } => "FM_PL_004",
            },
            ReceiverError::Dsp(e) => match e {
                DspError::InvalidArgument { .. } => "FM_DS_001",
                DspError::SingularSystem => "FM_DS_002",
            },
            ReceiverError::Rds(_) => "FM_RD_001",
            ReceiverError::Audio(_) => "FM_AU_001",
            ReceiverError::Config(_) => "FM_CF_001",
            ReceiverError::Common(_) => "FM_CM_001",
            ReceiverError::Other(_) => "FM_OT_001",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn error_codes_are_unique_across_variants() {
        let errors: Vec<ReceiverError> = vec![
            ReceiverError::Pipeline(PipelineError::Stalled),
            ReceiverError::Pipeline(PipelineError::InvalidWiring {
                reason: "x".into(),
            }),
            ReceiverError::Dsp(DspError::SingularSystem),
            ReceiverError::Rds(RdsError::StatePoisoned),
            ReceiverError::Audio("underrun".into()),
            ReceiverError::Config("bad toml".into()),
        ];
        let codes: HashSet<_> = errors.iter().map(|e| e.error_code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn block_failure_is_fatal() {
        let e = ReceiverError::Pipeline(PipelineError::BlockFailed {
            block: "fir".into(),
            reason: "boom".into(),
        });
        assert!(matches!(e.recovery_strategy(), RecoveryStrategy::Fatal));
    }
}
