//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::errors::SegcoreError;
use crate::rerank::RankError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("failed to read {path}: {source}")]
    Dump {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("{0}")]
    Segment(#[from] SegcoreError),

    #[error("{0}")]
    Rank(#[from] RankError),
}

impl CliError {
    pub fn argument(msg: impl Into<String>) -> Self {
        CliError::Argument(msg.into())
    }

    /// Stable error code string
    pub fn code_str(&self) -> &'static str {
        match self {
            CliError::Config(_) => "SEGCORE_CLI_CONFIG_ERROR",
            CliError::Dump { .. } => "SEGCORE_CLI_DUMP_ERROR",
            CliError::Json(_) | CliError::Io(_) => "SEGCORE_CLI_IO_ERROR",
            CliError::Argument(_) => "SEGCORE_CLI_ARGUMENT_ERROR",
            CliError::Segment(e) => e.code().code(),
            CliError::Rank(_) => "SEGCORE_CLI_RANK_ERROR",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldId;

    #[test]
    fn test_codes() {
        assert_eq!(
            CliError::argument("bad").code_str(),
            "SEGCORE_CLI_ARGUMENT_ERROR"
        );
        let segment: CliError =
            SegcoreError::field_id_invalid(FieldId::new(-1), "negative field id").into();
        assert_eq!(segment.code_str(), "SEGCORE_FIELD_ID_INVALID");
        let rank: CliError = RankError::UnsupportedType("expr".into()).into();
        assert_eq!(rank.code_str(), "SEGCORE_CLI_RANK_ERROR");
    }
}
