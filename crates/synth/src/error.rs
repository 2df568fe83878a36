use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SynthesisError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Model output is not a usable expression: {0}")]
    InvalidExpression(String),

    #[error("Model did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Model provider request failed: {0}")]
    Failed(String),
}
