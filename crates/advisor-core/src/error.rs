use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No matching instruments: {0}")]
    NoMatchingInstruments(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),
}
