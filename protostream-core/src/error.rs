//! Error types for marshalling operations.

use std::io;
use thiserror::Error;

/// The main error type for marshalling and unmarshalling.
///
/// Field-level variants carry the fully qualified field name so a schema/data
/// mismatch can be located without inspecting raw bytes.
#[derive(Debug, Error)]
pub enum ProtoStreamError {
    /// The field name is not part of the message schema.
    #[error("unknown field '{field}' in message type {message}")]
    UnknownField {
        /// Full name of the message type.
        message: String,
        /// The field name that was requested.
        field: String,
    },

    /// A required field was absent when writing, or missing after a full read.
    #[error("required field is missing: {field}")]
    RequiredFieldMissing {
        /// Full name of the field.
        field: String,
    },

    /// A singular writer/reader was used on a repeated field, or the reverse.
    #[error("wrong cardinality for field {field}: {message}")]
    WrongCardinality {
        /// Full name of the field.
        field: String,
        /// Details about the misuse.
        message: String,
    },

    /// The declared field type is incompatible with the value kind.
    #[error("type mismatch for field {field}: {message}")]
    TypeMismatch {
        /// Full name of the field.
        field: String,
        /// Details about the mismatch.
        message: String,
    },

    /// The same field number was written (or read) twice in one message context.
    #[error("field cannot be written or read twice: {field}")]
    DuplicateField {
        /// Full name of the field.
        field: String,
    },

    /// No marshaller or descriptor is registered for the requested type.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Truncated input, invalid varint, bad wire type or unterminated group.
    #[error("malformed wire data: {0}")]
    MalformedWireData(String),

    /// Message nesting exceeded the configured limit.
    #[error("maximum nesting depth of {0} exceeded")]
    MaxDepthExceeded(usize),

    /// A descriptor failed validation when it was built.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtoStreamError {
    pub(crate) fn type_mismatch(field: &str, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn wrong_cardinality(field: &str, message: impl Into<String>) -> Self {
        Self::WrongCardinality {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn required_missing(field: &str) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedWireData(message.into())
    }
}

/// A specialized `Result` type for marshalling operations.
pub type Result<T> = std::result::Result<T, ProtoStreamError>;
