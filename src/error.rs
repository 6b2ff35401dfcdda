//! Error types for the modulation pipeline.
//!
//! Every failure carries enough context for the operator to tell which
//! stage of the chunk loop broke and why.

use std::fmt;
use thiserror::Error;

/// Pipeline stage an I/O failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Reading,
    Modulating,
    Persisting,
    Demodulating,
    Reconstructing,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Reading => "reading",
            Stage::Modulating => "modulating",
            Stage::Persisting => "persisting",
            Stage::Demodulating => "demodulating",
            Stage::Reconstructing => "reconstructing",
            Stage::Writing => "writing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Open/read/write failure on the source, destination or symbol store.
    #[error("{stage} failed: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    /// A persisted symbol record is not two decimal integers.
    #[error("malformed symbol record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// M is not a usable power of two.
    #[error("invalid modulation order: {0}")]
    InvalidModulationOrder(String),

    /// A bit stream that does not end on a byte boundary.
    #[error("bit stream of {len} bits is not a whole number of bytes")]
    PartialByte { len: usize },

    #[error("configuration error: {0}")]
    Config(String),

    /// A parallel chunk worker stopped without reporting a result.
    #[error("worker error: {0}")]
    Worker(String),
}

impl Error {
    pub fn io(stage: Stage, source: std::io::Error) -> Self {
        Error::Io { stage, source }
    }

    /// Stage the error belongs to, when it is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Io { stage, .. } => Some(*stage),
            Error::MalformedRecord { .. } => Some(Stage::Demodulating),
            Error::PartialByte { .. } => Some(Stage::Reconstructing),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_stage() {
        let err = Error::io(
            Stage::Persisting,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        );
        assert_eq!(err.to_string(), "persisting failed: read-only");
        assert_eq!(err.stage(), Some(Stage::Persisting));
    }

    #[test]
    fn test_malformed_record_is_a_demodulation_failure() {
        let err = Error::MalformedRecord {
            line: 3,
            reason: "expected 2 fields, found 1".to_string(),
        };
        assert!(err.to_string().contains("line 3"));
        assert_eq!(err.stage(), Some(Stage::Demodulating));
    }
}
