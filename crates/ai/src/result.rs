use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The detector could not be reached (remote model, locked state, ...).
    #[error("anomaly service unavailable: {0}")]
    Unavailable(String),
}
