//! Client error types.

use crate::config::ConfigError;
use crate::connection::ConnectionState;
use gds_protocol::{AckStatus, DataType};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Why a login attempt did not reach the logged-in state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// The transport reported an error before login completed.
    Transport(String),
    /// The service answered the login with a non-success status.
    Rejected {
        status: AckStatus,
        reasons: BTreeMap<i32, String>,
        exception: Option<String>,
    },
    /// The transport closed before login completed.
    Closed,
    /// No login ack arrived within the connect timeout.
    Timeout,
}

impl fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionFailure::Transport(reason) => write!(f, "transport error: {}", reason),
            ConnectionFailure::Rejected {
                status, exception, ..
            } => match exception {
                Some(exception) => write!(f, "login rejected with {}: {}", status, exception),
                None => write!(f, "login rejected with {}", status),
            },
            ConnectionFailure::Closed => write!(f, "connection closed during login"),
            ConnectionFailure::Timeout => write!(f, "login timed out"),
        }
    }
}

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("protocol error: {0}")]
    Protocol(#[from] gds_protocol::ProtocolError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no reply to message {message_id} before the timeout")]
    Timeout { message_id: String },

    #[error("connection failed: {0}")]
    ConnectionFailed(ConnectionFailure),

    #[error("not logged in (state: {0})")]
    NotLoggedIn(ConnectionState),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("message id already in flight: {0}")]
    DuplicateMessageId(String),

    #[error("client already used; create a new one to reconnect")]
    AlreadyUsed,

    #[error("no handler registered for {0}")]
    UnhandledMessage(DataType),

    #[error("unexpected {data_type} reply to message {message_id}")]
    UnexpectedReply {
        message_id: String,
        data_type: DataType,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    /// Returns whether this error is a misuse of the client rather than a
    /// runtime failure.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ClientError::DuplicateMessageId(_)
                | ClientError::AlreadyUsed
                | ClientError::UnhandledMessage(_)
        )
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Timeout { .. } => true,
            ClientError::ConnectionClosed => true,
            ClientError::ConnectionFailed(failure) => {
                !matches!(failure, ConnectionFailure::Rejected { .. })
            }
            _ => false,
        }
    }
}
