use thiserror::Error;

use crate::record::Schema;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: Schema, found: Schema },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Record has {found} values, schema expects {expected}")]
    Arity { expected: usize, found: usize },
}

/// Errors raised while turning a wire payload into a [`crate::Batch`]
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected payload shape: {0}")]
    Shape(String),

    #[error("Non-numeric value for field '{field}': {value}")]
    NonNumeric { field: String, value: String },

    #[error("Record {index} has {found} values, schema {schema} expects {expected}")]
    Width {
        index: usize,
        expected: usize,
        found: usize,
        schema: Schema,
    },

    #[error("Columns have different lengths: '{field}' has {found}, expected {expected}")]
    RaggedColumns {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

pub type Result<T> = std::result::Result<T, BufferError>;
