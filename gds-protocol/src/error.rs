//! Protocol error types.

use crate::value::ValueType;
use std::fmt;
use thiserror::Error;

/// Errors raised by the value codec, the message parts and the message manager.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("field '{field}' of {owner}: found {found} value, expected {expected}")]
    TypeMismatch {
        field: &'static str,
        owner: &'static str,
        found: ValueType,
        expected: ValueType,
    },

    #[error("{owner}: sequence has {found} elements, expected {expected}")]
    ElementCount {
        owner: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("unknown data type tag: {0}")]
    UnknownDataType(i64),

    #[error("unsupported data type tag: {0}")]
    UnsupportedDataType(i64),

    #[error("unknown ack status code: {0}")]
    UnknownAckStatus(i64),

    #[error("unknown field value type: {0}")]
    UnknownFieldType(String),

    #[error("unknown consistency type: {0}")]
    UnknownConsistencyType(String),

    #[error("field '{field}' of {owner}: integer {value} out of range")]
    IntegerOutOfRange {
        field: &'static str,
        owner: &'static str,
        value: i64,
    },

    #[error("malformed value: {0}")]
    Malformed(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    #[error("value too large: {size} (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("missing required field '{field}' of {owner}")]
    MissingField {
        field: &'static str,
        owner: &'static str,
    },

    #[error("invalid {owner}: {reason}")]
    Invalid { owner: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The three failure families of the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed binary input.
    Decode,
    /// Well-formed but logically inconsistent content.
    Validation,
    /// Failure while producing bytes.
    Encode,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Decode => write!(f, "DECODE"),
            ErrorKind::Validation => write!(f, "VALIDATION"),
            ErrorKind::Encode => write!(f, "ENCODE"),
        }
    }
}

impl ProtocolError {
    /// Returns the failure family of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::MissingField { .. } | ProtocolError::Invalid { .. } => {
                ErrorKind::Validation
            }
            ProtocolError::Io(_) => ErrorKind::Encode,
            _ => ErrorKind::Decode,
        }
    }

    pub fn is_decode(&self) -> bool {
        self.kind() == ErrorKind::Decode
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub(crate) fn invalid(owner: &'static str, reason: impl Into<String>) -> Self {
        ProtocolError::Invalid {
            owner,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(err: impl fmt::Display) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}

impl From<rmp::encode::ValueWriteError<std::io::Error>> for ProtocolError {
    fn from(err: rmp::encode::ValueWriteError<std::io::Error>) -> Self {
        match err {
            rmp::encode::ValueWriteError::InvalidMarkerWrite(e)
            | rmp::encode::ValueWriteError::InvalidDataWrite(e) => ProtocolError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = ProtocolError::TypeMismatch {
            field: "messageId",
            owner: "Header",
            found: ValueType::Integer,
            expected: ValueType::String,
        };
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.is_decode());

        assert_eq!(ProtocolError::UnknownDataType(99).kind(), ErrorKind::Decode);
        assert_eq!(
            ProtocolError::ElementCount {
                owner: "Message",
                expected: 11,
                found: 3
            }
            .kind(),
            ErrorKind::Decode
        );

        let err = ProtocolError::MissingField {
            field: "userName",
            owner: "Header",
        };
        assert!(err.is_validation());
        assert!(ProtocolError::invalid("Header", "bad").is_validation());

        let io = std::io::Error::new(std::io::ErrorKind::Other, "sink closed");
        assert_eq!(ProtocolError::from(io).kind(), ErrorKind::Encode);
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = ProtocolError::TypeMismatch {
            field: "messageId",
            owner: "Header",
            found: ValueType::Integer,
            expected: ValueType::String,
        };
        let msg = err.to_string();
        assert!(msg.contains("messageId"));
        assert!(msg.contains("Header"));
        assert!(msg.contains("INTEGER"));
        assert!(msg.contains("STRING"));
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::ElementCount {
            owner: "Message",
            expected: 11,
            found: 7,
        };
        assert!(err.to_string().contains("11"));
        assert!(err.to_string().contains('7'));

        assert!(ProtocolError::UnknownDataType(42).to_string().contains("42"));
        assert!(ProtocolError::TrailingBytes(3).to_string().contains('3'));

        let err = ProtocolError::TooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));

        assert_eq!(ErrorKind::Validation.to_string(), "VALIDATION");
    }
}
