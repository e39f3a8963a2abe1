//! Validation and configuration errors for the CDPA engine.

use thiserror::Error;

/// Errors raised while validating engine parameters or generating traces.
///
/// These are reported before any experiment runs; a wrong secret recovered
/// by the attack itself is not an error, it is a normal (if undesired)
/// outcome reported through the harness success metrics.
#[derive(Error, Debug)]
pub enum CdpaError {
    #[error("bit width must be in 1..=64, got {0}")]
    InvalidBitWidth(u32),

    #[error("share count must be >= 1, got {0}")]
    InvalidShareCount(u32),

    #[error("trace count must be >= 1, got {0}")]
    InvalidTraceCount(u64),

    #[error("experiment count must be >= 1, got {0}")]
    InvalidExperimentCount(u64),

    #[error("noise standard deviation must be >= 0, got {0}")]
    InvalidNoise(f64),

    #[error("thread count must be >= 1, got {0}")]
    InvalidThreadCount(usize),

    #[error("-v/-l diagnostics are only valid when experiment-count == 1 (got {0})")]
    DiagnosticsRequireSingleExperiment(u64),

    #[error("failed to construct the noise distribution: {0}")]
    Distribution(#[from] rand_distr::NormalError),
}
