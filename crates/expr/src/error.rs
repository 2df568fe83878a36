use std::time::Duration;
use thiserror::Error;

/// Result type for expression compilation and evaluation
pub type Result<T> = std::result::Result<T, ExecError>;

/// Errors raised while compiling or evaluating an expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Name '{0}' is not defined; the table is available as `df`")]
    UnboundName(String),

    #[error("Operation '{0}' is not allowed")]
    DisallowedOperation(String),

    #[error("Column '{0}' does not exist")]
    UnknownColumn(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Index {index} is out of range for length {len}")]
    OutOfRange { index: i64, len: usize },

    #[error("Label {0} not found")]
    MissingLabel(String),

    #[error("Evaluation budget of {0} steps exhausted")]
    BudgetExhausted(u64),

    #[error("Evaluation exceeded the time limit of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Result has {cells} cells, above the limit of {limit}")]
    ResultTooLarge { cells: usize, limit: usize },
}

impl ExecError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub(crate) fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// `true` for the size-cap failure, which clients see as a separate kind.
    pub fn is_result_too_large(&self) -> bool {
        matches!(self, Self::ResultTooLarge { .. })
    }
}
