use polars::prelude::PolarsError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindnSeqError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Unknown enrichment method '{0}' (expected 'max' or 'mean')")]
    InvalidMethod(String),

    #[error("Observed counts for region {region} have {found} entries, expected {expected} (one per enriched kmer)")]
    CountVectorMismatch {
        region: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid region identifier '{0}'")]
    InvalidRegion(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid parameter: {name} = {value}, {message}")]
    InvalidParameter {
        name: String,
        value: String,
        message: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("External tool failed: {0}")]
    ExternalTool(String),
}

/// Type alias for Result with BindnSeqError
pub type Result<T> = std::result::Result<T, BindnSeqError>;

impl BindnSeqError {
    /// Create a new MissingData error
    pub fn missing_data(message: impl Into<String>) -> Self {
        BindnSeqError::MissingData(message.into())
    }

    /// Create a new CountVectorMismatch error
    pub fn count_mismatch(region: impl Into<String>, expected: usize, found: usize) -> Self {
        BindnSeqError::CountVectorMismatch {
            region: region.into(),
            expected,
            found,
        }
    }

    /// Create a new InvalidParameter error
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        BindnSeqError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            message: message.into(),
        }
    }
}
