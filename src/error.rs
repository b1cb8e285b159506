//! Fatal error taxonomy.
//!
//! Only structural problems live here. Row-level parse failures are
//! tallied in [`crate::models::IngestDiagnostics`] and never surface as
//! errors.

use std::path::PathBuf;
use thiserror::Error;

/// Structural failures that abort a run before any document is written.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Unsupported input encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Unsupported delimiter {0:?}: must be a single ASCII character")]
    UnsupportedDelimiter(char),

    #[error("Input is not readable as {0}")]
    Undecodable(&'static str),

    #[error("Input file is empty")]
    EmptyInput,

    #[error("Wrong delimiter: expected {expected:?} but the header is {found:?}-delimited")]
    WrongDelimiter { expected: char, found: char },

    #[error("Required columns missing from header: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised by an aggregation pass.
#[derive(Error, Debug)]
pub enum PassError {
    #[error("{pass}: required column '{column}' is absent from the input")]
    MissingField {
        pass: &'static str,
        column: &'static str,
    },

    #[error("{pass}: failed to encode document: {source}")]
    Encode {
        pass: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_lists_all() {
        let err = IngestError::MissingColumns(vec!["FKZ".to_string(), "Ressort".to_string()]);
        assert_eq!(
            err.to_string(),
            "Required columns missing from header: FKZ, Ressort"
        );
    }

    #[test]
    fn test_wrong_delimiter_message() {
        let err = IngestError::WrongDelimiter {
            expected: ';',
            found: ',',
        };
        assert!(err.to_string().contains("';'"));
        assert!(err.to_string().contains("','"));
    }
}
