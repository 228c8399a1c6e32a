use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    #[error("Model fit failure: {0}")]
    ModelFitFailure(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    StoreError(String),
}
