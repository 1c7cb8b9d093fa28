//! A complete wire message: one header and one data payload.

use crate::data::{Data, DataType};
use crate::error::ProtocolError;
use crate::header::Header;
use crate::manager::MessageManager;
use crate::part::{MessagePart, RawCache};
use bytes::Bytes;

/// Elements of the outer message sequence: the header fields plus the payload.
pub const MESSAGE_ELEMENTS: u32 = Header::ELEMENTS + 1;

/// An immutable header and payload pair.
///
/// The encoded form is produced on first use and kept; decoded messages keep
/// the exact bytes they were read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    header: Header,
    data: Data,
    raw: RawCache,
}

impl Message {
    /// Pairs a header with a payload. The header must announce the payload's
    /// type and must not describe a fragment.
    pub fn new(header: Header, data: Data) -> Result<Self, ProtocolError> {
        check_pair(&header, &data)?;
        Ok(Self {
            header,
            data,
            raw: RawCache::new(),
        })
    }

    pub(crate) fn decoded(header: Header, data: Data, raw: Bytes) -> Self {
        Self {
            header,
            data,
            raw: RawCache::filled(raw),
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn message_id(&self) -> &str {
        &self.header.message_id
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn into_parts(self) -> (Header, Data) {
        (self.header, self.data)
    }

    /// The encoded message, serialized on first call.
    pub fn raw_bytes(&self) -> Result<Bytes, ProtocolError> {
        self.raw
            .get_or_encode(|| MessageManager::encode_message(&self.header, &self.data))
    }

    /// Size of the encoded message in bytes.
    pub fn size(&self) -> Result<usize, ProtocolError> {
        Ok(self.raw_bytes()?.len())
    }
}

pub(crate) fn check_pair(header: &Header, data: &Data) -> Result<(), ProtocolError> {
    if header.data_type != data.data_type() {
        return Err(ProtocolError::invalid(
            "Message",
            format!(
                "header announces {} but payload is {}",
                header.data_type,
                data.data_type()
            ),
        ));
    }
    if header.is_fragmented() {
        return Err(ProtocolError::invalid(
            "Message",
            "a complete payload cannot travel under a fragment header",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EventData, QueryRequestData};
    use crate::header::Fragmentation;

    #[test]
    fn test_message_raw_bytes_cached() {
        let header = Header::new("user", "msg-1", DataType::QueryRequest);
        let message = Message::new(header, QueryRequestData::new("SELECT 1").into()).unwrap();
        let first = message.raw_bytes().unwrap();
        let second = message.raw_bytes().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_ptr(), second.as_ptr());
        assert_eq!(message.size().unwrap(), first.len());
        // fixarray(11)
        assert_eq!(first[0], 0x9b);
    }

    #[test]
    fn test_message_type_mismatch() {
        let header = Header::new("user", "msg-1", DataType::QueryRequest);
        let err = Message::new(header, EventData::new("DELETE FROM t").into()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_message_rejects_fragment_header() {
        let header = Header::new("user", "msg-1", DataType::Event).with_fragmentation(
            Fragmentation::Fragment {
                first: true,
                last: false,
                offset: 0,
                full_data_size: 100,
            },
        );
        assert!(Message::new(header, EventData::new("DELETE FROM t").into()).is_err());
    }

    #[test]
    fn test_into_parts() {
        let header = Header::new("user", "msg-7", DataType::Event);
        let message = Message::new(header.clone(), EventData::new("DELETE FROM t").into()).unwrap();
        assert_eq!(message.message_id(), "msg-7");
        assert_eq!(message.data_type(), DataType::Event);
        let (h, d) = message.into_parts();
        assert_eq!(h, header);
        assert_eq!(d.data_type(), DataType::Event);
    }
}
