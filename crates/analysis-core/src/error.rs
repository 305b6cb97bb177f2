use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Metric missing: {0}")]
    MetricMissing(String),

    #[error("External service failure: {0}")]
    ExternalServiceFailure(String),

    #[error("Invalid comparison request: {0}")]
    InvalidComparisonRequest(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
