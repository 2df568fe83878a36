use std::path::PathBuf;
use thiserror::Error;

/// Result type for table operations
pub type Result<T> = std::result::Result<T, TableError>;

/// Errors raised while building or loading a table
#[derive(Error, Debug)]
pub enum TableError {
    /// The source file could not be opened
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record has a different number of fields than the header
    #[error("Ragged row at line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        line: u64,
        expected: u64,
        found: u64,
    },

    /// A field is not valid UTF-8
    #[error("Invalid UTF-8 at line {line}")]
    Encoding { line: u64 },

    /// The header row is missing or empty
    #[error("Source has no columns")]
    NoColumns,

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Column {name} has {found} values, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TableError {
    pub(crate) fn from_csv(err: csv::Error) -> Self {
        let line = err.position().map(csv::Position::line).unwrap_or_default();
        let mapped = match err.kind() {
            csv::ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => Some(Self::RaggedRow {
                line: pos.as_ref().map(csv::Position::line).unwrap_or(line),
                expected: *expected_len,
                found: *len,
            }),
            csv::ErrorKind::Utf8 { pos, .. } => Some(Self::Encoding {
                line: pos.as_ref().map(csv::Position::line).unwrap_or(line),
            }),
            _ => None,
        };
        match mapped {
            Some(mapped) => mapped,
            None => Self::Csv(err),
        }
    }
}
