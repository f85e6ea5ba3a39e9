//! Error types for the codec

use thiserror::Error;

/// Errors raised while turning a typed value into a [`Value`](crate::Value)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("numeric overflow at {path}: {value} is not representable as a JSON number")]
    NumericOverflow { path: String, value: String },

    #[error("cyclic reference at {path}: {type_name} is already being encoded")]
    CyclicReference { path: String, type_name: &'static str },

    #[error("unsupported type at {path}: {type_name} ({reason})")]
    UnsupportedType {
        path: String,
        type_name: &'static str,
        reason: String,
    },
}

impl EncodingError {
    /// JSON path of the value that failed to encode
    pub fn path(&self) -> &str {
        match self {
            EncodingError::NumericOverflow { path, .. }
            | EncodingError::CyclicReference { path, .. }
            | EncodingError::UnsupportedType { path, .. } => path,
        }
    }
}

/// Errors raised by the JSON text parser. Every variant carries the byte
/// offset into the input where the problem was detected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed string at offset {offset}: {reason}")]
    MalformedString { offset: usize, reason: &'static str },

    #[error("malformed number at offset {offset}: {reason}")]
    MalformedNumber { offset: usize, reason: &'static str },

    #[error("unexpected token {found:?} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        offset: usize,
        found: char,
        expected: &'static str,
    },

    #[error("unexpected end of input at offset {offset}, expected {expected}")]
    UnexpectedEnd { offset: usize, expected: &'static str },

    #[error("trailing content at offset {offset}")]
    TrailingContent { offset: usize },

    #[error("nesting deeper than {max_depth} levels at offset {offset}")]
    NestingTooDeep { offset: usize, max_depth: usize },

    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },
}

impl ParseError {
    /// Byte offset of the failure
    pub fn offset(&self) -> usize {
        match *self {
            ParseError::MalformedString { offset, .. }
            | ParseError::MalformedNumber { offset, .. }
            | ParseError::UnexpectedToken { offset, .. }
            | ParseError::UnexpectedEnd { offset, .. }
            | ParseError::TrailingContent { offset }
            | ParseError::NestingTooDeep { offset, .. }
            | ParseError::InvalidUtf8 { offset } => offset,
        }
    }
}

/// Errors raised while projecting a [`Value`](crate::Value) onto a typed target
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("unknown field {field:?} at {path} for {type_name}")]
    UnknownField {
        path: String,
        field: String,
        type_name: &'static str,
    },

    #[error("type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: &'static str,
    },

    #[error("length mismatch at {path}: expected {expected} elements, got {actual}")]
    LengthMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("missing required field {field:?} at {path} for {type_name}")]
    MissingRequiredField {
        path: String,
        field: &'static str,
        type_name: &'static str,
    },

    #[error("value {value} at {path} is out of range for {target}")]
    OutOfRange {
        path: String,
        value: String,
        target: &'static str,
    },

    #[error("invalid value at {path}: {reason}")]
    InvalidValue { path: String, reason: String },
}

impl BindingError {
    /// JSON path of the value that failed to bind
    pub fn path(&self) -> &str {
        match self {
            BindingError::UnknownField { path, .. }
            | BindingError::TypeMismatch { path, .. }
            | BindingError::LengthMismatch { path, .. }
            | BindingError::MissingRequiredField { path, .. }
            | BindingError::OutOfRange { path, .. }
            | BindingError::InvalidValue { path, .. } => path,
        }
    }
}

/// Any error the codec can return
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("JSON conversion error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid codec configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
