use thiserror::Error;

/// Configuration-related errors with structured variants.
///
/// These are the only errors in the crate that are intentionally fatal:
/// they surface misconfiguration at construction or registration time,
/// before any background work starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown voting policy '{0}' (expected majority, unanimous, confidence, or single)")]
    UnknownVotingPolicy(String),

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("model '{0}' is already registered")]
    DuplicateModel(String),

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors raised by a single detector's `update`.
///
/// Caught inside the ensemble dispatch; the faulty detector's vote is
/// treated as absent for that call and the other detectors are unaffected.
#[derive(Error, Debug, Clone)]
pub enum DetectorError {
    #[error("non-finite sample value: {0}")]
    NonFiniteSample(f64),

    #[error("empty sample vector")]
    EmptySample,

    #[error("sample dimension {got} does not match established dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Errors surfaced by a trainable model collaborator.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("partial_fit failed: {0}")]
    FitFailed(String),

    #[error("failed to save model: {0}")]
    SaveFailed(String),
}

/// Errors surfaced by a training-data source collaborator.
#[derive(Error, Debug)]
pub enum DataSourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("data source returned malformed batch: {0}")]
    Malformed(String),
}

/// Errors raised while executing a single retraining job.
///
/// Caught per job; recorded to the failed-job history and the scheduler
/// tick proceeds to the remaining jobs.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("insufficient training data: {got} samples, need {min}")]
    InsufficientData { got: usize, min: usize },

    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model reported unsuccessful fit: {0}")]
    FitRejected(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
