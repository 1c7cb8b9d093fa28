//! Encoding and decoding of complete messages.

use crate::data::{Data, DataType};
use crate::error::ProtocolError;
use crate::fragment::Fragment;
use crate::header::{Fragmentation, Header};
use crate::message::{check_pair, Message, MESSAGE_ELEMENTS};
use crate::part::MessagePart;
use crate::value::{ValueReader, ValueWriter};
use bytes::Bytes;

const OWNER: &str = "Message";

/// A decoded inbound message: complete, or one slice of a larger payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(Message),
    Fragment(Fragment),
}

impl Inbound {
    pub fn header(&self) -> &Header {
        match self {
            Inbound::Message(message) => message.header(),
            Inbound::Fragment(fragment) => &fragment.header,
        }
    }
}

/// Stateless entry point of the codec.
pub struct MessageManager;

impl MessageManager {
    /// Encodes a complete message: the outer sequence header, the header
    /// fields and the payload. Both parts are validated first.
    pub fn encode_message(header: &Header, data: &Data) -> Result<Bytes, ProtocolError> {
        check_pair(header, data)?;
        header.validate()?;

        let mut w = ValueWriter::with_capacity(256);
        w.write_array_len(MESSAGE_ELEMENTS as usize)?;
        header.pack_fields(&mut w)?;
        data.write(&mut w)?;
        Ok(w.into_bytes())
    }

    /// Encodes one slice of a fragmented payload under a fragment header.
    pub fn encode_fragment(header: &Header, chunk: &[u8]) -> Result<Bytes, ProtocolError> {
        if !header.is_fragmented() {
            return Err(ProtocolError::invalid(
                OWNER,
                "payload slice under a non-fragment header",
            ));
        }
        header.validate()?;

        let mut w = ValueWriter::with_capacity(chunk.len() + 128);
        w.write_array_len(MESSAGE_ELEMENTS as usize)?;
        header.pack_fields(&mut w)?;
        w.write_bin(chunk)?;
        Ok(w.into_bytes())
    }

    /// Encodes a message, splitting the payload into slices of at most
    /// `transmission_unit` bytes when it does not fit in one.
    pub fn fragment(
        header: &Header,
        data: &Data,
        transmission_unit: usize,
    ) -> Result<Vec<Bytes>, ProtocolError> {
        if transmission_unit == 0 {
            return Err(ProtocolError::invalid(OWNER, "zero transmission unit"));
        }
        check_pair(header, data)?;

        let payload = data.to_bytes()?;
        if payload.len() <= transmission_unit {
            return Ok(vec![Self::encode_message(header, data)?]);
        }

        let full_data_size = payload.len() as i64;
        payload
            .chunks(transmission_unit)
            .scan(0usize, |offset, chunk| {
                let start = *offset;
                *offset += chunk.len();
                Some((start, chunk))
            })
            .map(|(offset, chunk)| {
                let fragment_header = header.clone().with_fragmentation(Fragmentation::Fragment {
                    first: offset == 0,
                    last: offset + chunk.len() == payload.len(),
                    offset: offset as i64,
                    full_data_size,
                });
                Self::encode_fragment(&fragment_header, chunk)
            })
            .collect()
    }

    /// Decodes only the header of a message.
    pub fn decode_header(bytes: &[u8]) -> Result<Header, ProtocolError> {
        let mut r = ValueReader::new(bytes);
        Self::read_header(&mut r)
    }

    /// Decodes the payload of a complete message, reading the header first
    /// to learn its type.
    pub fn decode_data(bytes: &[u8]) -> Result<Data, ProtocolError> {
        let mut r = ValueReader::new(bytes);
        let header = Self::read_header(&mut r)?;
        if header.is_fragmented() {
            return Err(ProtocolError::invalid(
                OWNER,
                "fragment carries a partial payload",
            ));
        }
        let data = Data::read(&mut r, header.data_type)?;
        r.finish()?;
        Ok(data)
    }

    /// Decodes a complete, non-fragmented message.
    pub fn decode_message(bytes: Bytes) -> Result<Message, ProtocolError> {
        match Self::decode(bytes)? {
            Inbound::Message(message) => Ok(message),
            Inbound::Fragment(_) => Err(ProtocolError::invalid(
                OWNER,
                "fragment carries a partial payload",
            )),
        }
    }

    /// Decodes any inbound message, complete or fragment.
    pub fn decode(bytes: Bytes) -> Result<Inbound, ProtocolError> {
        let mut r = ValueReader::new(&bytes);
        let header = Self::read_header(&mut r)?;

        if header.is_fragmented() {
            let chunk = r
                .read_binary("data", OWNER)?
                .ok_or(ProtocolError::MissingField {
                    field: "data",
                    owner: OWNER,
                })?;
            r.finish()?;
            return Ok(Inbound::Fragment(Fragment::new(header, chunk)?));
        }

        let data = Data::read(&mut r, header.data_type)?;
        r.finish()?;
        Ok(Inbound::Message(Message::decoded(header, data, bytes)))
    }

    /// Decodes a bare payload of a known type, such as a reassembled
    /// fragmented payload.
    pub fn decode_partial_data(bytes: &[u8], data_type: DataType) -> Result<Data, ProtocolError> {
        Data::from_bytes(bytes, data_type)
    }

    fn read_header(r: &mut ValueReader<'_>) -> Result<Header, ProtocolError> {
        r.expect_array(MESSAGE_ELEMENTS, OWNER)?;
        let header = Header::unpack_fields(r)?;
        header.validate()?;
        Ok(header)
    }
}
