//! # gds-protocol
//!
//! Wire protocol implementation for GDS clients.
//!
//! This crate provides:
//! - A strict MessagePack value reader and writer
//! - The message header and every data payload variant
//! - Whole-message encoding and decoding through [`MessageManager`]
//! - Payload fragmentation and reassembly

pub mod data;
pub mod error;
pub mod fragment;
pub mod header;
pub mod holders;
pub mod manager;
pub mod message;
pub mod part;
pub mod status;
pub mod value;

pub use data::{
    AckBody, AckData, AckResult, AckTypeData, AttachmentRequestAckData,
    AttachmentRequestAckTypeData, AttachmentRequestData, AttachmentResponseAckData,
    AttachmentResponseAckTypeData, AttachmentResponseData, ConnectionAckData,
    ConnectionAckTypeData, ConnectionData, Data, DataType, DataVariant, EventAckData, EventData,
    EventDocumentAckData, EventDocumentData, NextQueryPageData, QueryRequestAckData,
    QueryRequestAckTypeData, QueryRequestData,
};
pub use error::{ErrorKind, ProtocolError};
pub use fragment::{Fragment, FragmentAssembler};
pub use header::{Fragmentation, Header};
pub use holders::{
    AttachmentResponseResultHolder, AttachmentResultHolder, ConsistencyType,
    EventDocumentResultHolder, EventResultHolder, EventSubResultHolder, FieldHolder,
    FieldValueType, GdsHolder, PriorityLevelHolder, QueryContextHolder, QueryResultHolder,
};
pub use manager::{Inbound, MessageManager};
pub use message::Message;
pub use part::MessagePart;
pub use status::AckStatus;
pub use value::{ValueReader, ValueType, ValueWriter};

/// Protocol version announced in the login request.
pub const PROTOCOL_VERSION: i32 = 6;
