//! # gds-client
//!
//! Client library for GDS.
//!
//! This crate provides:
//! - A transport boundary with an in-memory implementation for tests
//! - The connection state machine with login handshake
//! - Type-keyed dispatch of inbound messages
//! - Synchronous request/response correlation by message id

pub mod config;
pub mod connection;
pub mod error;
pub mod listener;
pub mod sync;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use connection::{AsyncClient, ConnectionEvent, ConnectionState};
pub use error::{ClientError, ConnectionFailure};
pub use listener::{MessageHandler, MessageListener};
pub use sync::{AttachmentReply, Reply, SyncClient};
pub use transport::{MemoryPeer, MemoryTransport, Transport, TransportEvent};
