//! Data payloads.
//!
//! Every message carries exactly one payload, identified in the header by
//! its [`DataType`] tag and packed as its own count-prefixed sequence.

mod ack;
mod attachment;
mod connection;
mod document;
mod event;
mod query;

pub use ack::{AckBody, AckData, AckResult, AckTypeData};
pub use attachment::{
    AttachmentRequestAckData, AttachmentRequestAckTypeData, AttachmentRequestData,
    AttachmentResponseAckData, AttachmentResponseAckTypeData, AttachmentResponseData,
};
pub use connection::{ConnectionAckData, ConnectionAckTypeData, ConnectionData};
pub use document::{EventDocumentAckData, EventDocumentData};
pub use event::{EventAckData, EventData};
pub use query::{NextQueryPageData, QueryRequestAckData, QueryRequestAckTypeData, QueryRequestData};

use crate::error::ProtocolError;
use crate::part::{required, MessagePart};
use crate::value::{ValueReader, ValueWriter};
use bytes::Bytes;
use std::fmt;

/// Tag identifying the payload variant that follows a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Connection = 0,
    ConnectionAck = 1,
    Event = 2,
    EventAck = 3,
    AttachmentRequest = 4,
    AttachmentRequestAck = 5,
    AttachmentResponse = 6,
    AttachmentResponseAck = 7,
    EventDocument = 8,
    EventDocumentAck = 9,
    QueryRequest = 10,
    QueryRequestAck = 11,
    NextQueryPage = 12,
}

impl DataType {
    pub const ALL: [DataType; 13] = [
        DataType::Connection,
        DataType::ConnectionAck,
        DataType::Event,
        DataType::EventAck,
        DataType::AttachmentRequest,
        DataType::AttachmentRequestAck,
        DataType::AttachmentResponse,
        DataType::AttachmentResponseAck,
        DataType::EventDocument,
        DataType::EventDocumentAck,
        DataType::QueryRequest,
        DataType::QueryRequestAck,
        DataType::NextQueryPage,
    ];

    pub fn tag(&self) -> i64 {
        *self as i64
    }

    /// Resolves a wire tag. Tags 13 and 14 are reserved by the protocol but
    /// carry no payload this client understands.
    pub fn from_tag(tag: i64) -> Result<Self, ProtocolError> {
        match tag {
            0..=12 => Ok(Self::ALL[tag as usize]),
            13 | 14 => Err(ProtocolError::UnsupportedDataType(tag)),
            other => Err(ProtocolError::UnknownDataType(other)),
        }
    }

    /// Returns whether this payload answers a request rather than starting one.
    pub fn is_ack(&self) -> bool {
        matches!(
            self,
            DataType::ConnectionAck
                | DataType::EventAck
                | DataType::AttachmentRequestAck
                | DataType::AttachmentResponseAck
                | DataType::EventDocumentAck
                | DataType::QueryRequestAck
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Connection => "Connection",
            DataType::ConnectionAck => "ConnectionAck",
            DataType::Event => "Event",
            DataType::EventAck => "EventAck",
            DataType::AttachmentRequest => "AttachmentRequest",
            DataType::AttachmentRequestAck => "AttachmentRequestAck",
            DataType::AttachmentResponse => "AttachmentResponse",
            DataType::AttachmentResponseAck => "AttachmentResponseAck",
            DataType::EventDocument => "EventDocument",
            DataType::EventDocumentAck => "EventDocumentAck",
            DataType::QueryRequest => "QueryRequest",
            DataType::QueryRequestAck => "QueryRequestAck",
            DataType::NextQueryPage => "NextQueryPage",
        }
    }

    pub(crate) fn write(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_int(self.tag())
    }

    pub(crate) fn read(
        r: &mut ValueReader<'_>,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Self>, ProtocolError> {
        r.read_long(field, owner)?.map(Self::from_tag).transpose()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.tag())
    }
}

/// A payload type that is one arm of [`Data`].
pub trait DataVariant: MessagePart + Into<Data> {
    const DATA_TYPE: DataType;

    /// Extracts the variant, handing the payload back when it is another one.
    fn from_data(data: Data) -> Result<Self, Data>;
}

/// A decoded or outgoing data payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Connection(ConnectionData),
    ConnectionAck(ConnectionAckData),
    Event(EventData),
    EventAck(EventAckData),
    AttachmentRequest(AttachmentRequestData),
    AttachmentRequestAck(AttachmentRequestAckData),
    AttachmentResponse(AttachmentResponseData),
    AttachmentResponseAck(AttachmentResponseAckData),
    EventDocument(EventDocumentData),
    EventDocumentAck(EventDocumentAckData),
    QueryRequest(QueryRequestData),
    QueryRequestAck(QueryRequestAckData),
    NextQueryPage(NextQueryPageData),
}

macro_rules! data_variant {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Data {
            fn from(data: $ty) -> Self {
                Data::$variant(data)
            }
        }

        impl DataVariant for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn from_data(data: Data) -> Result<Self, Data> {
                match data {
                    Data::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

data_variant!(ConnectionData, Connection);
data_variant!(ConnectionAckData, ConnectionAck);
data_variant!(EventData, Event);
data_variant!(EventAckData, EventAck);
data_variant!(AttachmentRequestData, AttachmentRequest);
data_variant!(AttachmentRequestAckData, AttachmentRequestAck);
data_variant!(AttachmentResponseData, AttachmentResponse);
data_variant!(AttachmentResponseAckData, AttachmentResponseAck);
data_variant!(EventDocumentData, EventDocument);
data_variant!(EventDocumentAckData, EventDocumentAck);
data_variant!(QueryRequestData, QueryRequest);
data_variant!(QueryRequestAckData, QueryRequestAck);
data_variant!(NextQueryPageData, NextQueryPage);

fn read_variant<T: DataVariant>(r: &mut ValueReader<'_>) -> Result<Data, ProtocolError> {
    let part = required(r.read_part::<T>("data", "Message")?, "data", "Message")?;
    Ok(part.into())
}

impl Data {
    pub fn data_type(&self) -> DataType {
        match self {
            Data::Connection(_) => DataType::Connection,
            Data::ConnectionAck(_) => DataType::ConnectionAck,
            Data::Event(_) => DataType::Event,
            Data::EventAck(_) => DataType::EventAck,
            Data::AttachmentRequest(_) => DataType::AttachmentRequest,
            Data::AttachmentRequestAck(_) => DataType::AttachmentRequestAck,
            Data::AttachmentResponse(_) => DataType::AttachmentResponse,
            Data::AttachmentResponseAck(_) => DataType::AttachmentResponseAck,
            Data::EventDocument(_) => DataType::EventDocument,
            Data::EventDocumentAck(_) => DataType::EventDocumentAck,
            Data::QueryRequest(_) => DataType::QueryRequest,
            Data::QueryRequestAck(_) => DataType::QueryRequestAck,
            Data::NextQueryPage(_) => DataType::NextQueryPage,
        }
    }

    /// Runs the variant's content check.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Data::Connection(d) => d.validate(),
            Data::ConnectionAck(d) => d.validate(),
            Data::Event(d) => d.validate(),
            Data::EventAck(d) => d.validate(),
            Data::AttachmentRequest(d) => d.validate(),
            Data::AttachmentRequestAck(d) => d.validate(),
            Data::AttachmentResponse(d) => d.validate(),
            Data::AttachmentResponseAck(d) => d.validate(),
            Data::EventDocument(d) => d.validate(),
            Data::EventDocumentAck(d) => d.validate(),
            Data::QueryRequest(d) => d.validate(),
            Data::QueryRequestAck(d) => d.validate(),
            Data::NextQueryPage(d) => d.validate(),
        }
    }

    /// Writes the payload as its own count-prefixed sequence.
    pub(crate) fn write(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        match self {
            Data::Connection(d) => w.write_part(d),
            Data::ConnectionAck(d) => w.write_part(d),
            Data::Event(d) => w.write_part(d),
            Data::EventAck(d) => w.write_part(d),
            Data::AttachmentRequest(d) => w.write_part(d),
            Data::AttachmentRequestAck(d) => w.write_part(d),
            Data::AttachmentResponse(d) => w.write_part(d),
            Data::AttachmentResponseAck(d) => w.write_part(d),
            Data::EventDocument(d) => w.write_part(d),
            Data::EventDocumentAck(d) => w.write_part(d),
            Data::QueryRequest(d) => w.write_part(d),
            Data::QueryRequestAck(d) => w.write_part(d),
            Data::NextQueryPage(d) => w.write_part(d),
        }
    }

    /// Reads a payload of the given type and runs its content check.
    pub(crate) fn read(
        r: &mut ValueReader<'_>,
        data_type: DataType,
    ) -> Result<Self, ProtocolError> {
        match data_type {
            DataType::Connection => read_variant::<ConnectionData>(r),
            DataType::ConnectionAck => read_variant::<ConnectionAckData>(r),
            DataType::Event => read_variant::<EventData>(r),
            DataType::EventAck => read_variant::<EventAckData>(r),
            DataType::AttachmentRequest => read_variant::<AttachmentRequestData>(r),
            DataType::AttachmentRequestAck => read_variant::<AttachmentRequestAckData>(r),
            DataType::AttachmentResponse => read_variant::<AttachmentResponseData>(r),
            DataType::AttachmentResponseAck => read_variant::<AttachmentResponseAckData>(r),
            DataType::EventDocument => read_variant::<EventDocumentData>(r),
            DataType::EventDocumentAck => read_variant::<EventDocumentAckData>(r),
            DataType::QueryRequest => read_variant::<QueryRequestData>(r),
            DataType::QueryRequestAck => read_variant::<QueryRequestAckData>(r),
            DataType::NextQueryPage => read_variant::<NextQueryPageData>(r),
        }
    }

    /// Encodes the payload alone, as carried inside a message or split into fragments.
    pub fn to_bytes(&self) -> Result<Bytes, ProtocolError> {
        let mut w = ValueWriter::new();
        self.write(&mut w)?;
        Ok(w.into_bytes())
    }

    pub fn size(&self) -> Result<usize, ProtocolError> {
        Ok(self.to_bytes()?.len())
    }

    /// Decodes a bare payload whose type is already known. The whole input
    /// must be consumed.
    pub fn from_bytes(bytes: &[u8], data_type: DataType) -> Result<Self, ProtocolError> {
        let mut r = ValueReader::new(bytes);
        let data = Self::read(&mut r, data_type)?;
        r.finish()?;
        Ok(data)
    }

    /// Extracts a concrete variant.
    pub fn into_variant<T: DataVariant>(self) -> Result<T, Data> {
        T::from_data(self)
    }

    pub fn as_connection_ack(&self) -> Option<&ConnectionAckData> {
        match self {
            Data::ConnectionAck(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_attachment_request_ack(&self) -> Option<&AttachmentRequestAckData> {
        match self {
            Data::AttachmentRequestAck(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_attachment_response(&self) -> Option<&AttachmentResponseData> {
        match self {
            Data::AttachmentResponse(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_query_request_ack(&self) -> Option<&QueryRequestAckData> {
        match self {
            Data::QueryRequestAck(d) => Some(d),
            _ => None,
        }
    }
}
