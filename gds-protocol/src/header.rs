//! Message header (Base variant).
//!
//! Header layout (10 elements, packed directly into the outer message sequence):
//!
//! ```text
//! userName, messageId, createTime, requestTime, isFragmented,
//! firstFragment?, lastFragment?, offset?, fullDataSize?, dataType
//! ```

use crate::data::DataType;
use crate::error::ProtocolError;
use crate::part::{required, MessagePart};
use crate::value::{ValueReader, ValueWriter};

/// Largest payload a fragmented message may announce: the capacity of a
/// MessagePack `bin 32`.
pub const MAX_FULL_DATA_SIZE: i64 = u32::MAX as i64;

/// Fragmentation metadata of a header.
///
/// The wire carries four loosely-typed fields plus a flag; in memory only
/// the consistent combinations exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragmentation {
    /// The message is sent in one piece. The offset may still be carried.
    Whole { offset: Option<i64> },
    /// The message is one slice of a larger payload.
    Fragment {
        first: bool,
        last: bool,
        offset: i64,
        full_data_size: i64,
    },
}

impl Default for Fragmentation {
    fn default() -> Self {
        Fragmentation::Whole { offset: None }
    }
}

impl Fragmentation {
    /// Builds the metadata from the raw wire fields, enforcing that the
    /// fragment fields are present exactly when `is_fragmented` is set.
    pub fn from_flags(
        is_fragmented: bool,
        first_fragment: Option<bool>,
        last_fragment: Option<bool>,
        offset: Option<i64>,
        full_data_size: Option<i64>,
    ) -> Result<Self, ProtocolError> {
        if !is_fragmented {
            if first_fragment.is_some() || last_fragment.is_some() || full_data_size.is_some() {
                return Err(ProtocolError::invalid(
                    Header::NAME,
                    "fragment fields set on a non-fragmented message",
                ));
            }
            return Ok(Fragmentation::Whole { offset });
        }

        match (first_fragment, last_fragment, offset, full_data_size) {
            (Some(first), Some(last), Some(offset), Some(full_data_size)) => {
                let fragmentation = Fragmentation::Fragment {
                    first,
                    last,
                    offset,
                    full_data_size,
                };
                fragmentation.check()?;
                Ok(fragmentation)
            }
            _ => Err(ProtocolError::invalid(
                Header::NAME,
                "fragmented message without firstFragment, lastFragment, offset and fullDataSize",
            )),
        }
    }

    pub fn is_fragmented(&self) -> bool {
        matches!(self, Fragmentation::Fragment { .. })
    }

    pub fn offset(&self) -> Option<i64> {
        match self {
            Fragmentation::Whole { offset } => *offset,
            Fragmentation::Fragment { offset, .. } => Some(*offset),
        }
    }

    fn check(&self) -> Result<(), ProtocolError> {
        if let Fragmentation::Fragment {
            first,
            offset,
            full_data_size,
            ..
        } = *self
        {
            if full_data_size > MAX_FULL_DATA_SIZE {
                return Err(ProtocolError::invalid(
                    Header::NAME,
                    format!("fullDataSize {full_data_size} exceeds {MAX_FULL_DATA_SIZE}"),
                ));
            }
            if offset < 0 || full_data_size <= 0 || offset >= full_data_size {
                return Err(ProtocolError::invalid(
                    Header::NAME,
                    format!("fragment offset {offset} outside payload of {full_data_size} bytes"),
                ));
            }
            if first != (offset == 0) {
                return Err(ProtocolError::invalid(
                    Header::NAME,
                    "firstFragment must be set exactly on the fragment at offset 0",
                ));
            }
        }
        Ok(())
    }
}

/// Routing, identity and fragmentation metadata preceding every data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub user_name: String,
    /// Unique per in-flight request; replies echo it back.
    pub message_id: String,
    /// Milliseconds since the Unix epoch.
    pub create_time: i64,
    /// Milliseconds since the Unix epoch.
    pub request_time: i64,
    pub fragmentation: Fragmentation,
    pub data_type: DataType,
}

impl Header {
    /// Creates a non-fragmented header stamped with the current time.
    pub fn new(
        user_name: impl Into<String>,
        message_id: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            user_name: user_name.into(),
            message_id: message_id.into(),
            create_time: now,
            request_time: now,
            fragmentation: Fragmentation::default(),
            data_type,
        }
    }

    /// Creates a header with a freshly generated message id.
    pub fn with_generated_id(user_name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(user_name, Self::generate_message_id(), data_type)
    }

    /// Returns a fresh, globally unique message id.
    pub fn generate_message_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Builds the header of a reply to this message: same user and message
    /// id, new creation time, the original creation time as request time.
    pub fn reply(&self, data_type: DataType) -> Self {
        Self {
            user_name: self.user_name.clone(),
            message_id: self.message_id.clone(),
            create_time: chrono::Utc::now().timestamp_millis(),
            request_time: self.create_time,
            fragmentation: Fragmentation::default(),
            data_type,
        }
    }

    pub fn with_times(mut self, create_time: i64, request_time: i64) -> Self {
        self.create_time = create_time;
        self.request_time = request_time;
        self
    }

    pub fn with_fragmentation(mut self, fragmentation: Fragmentation) -> Self {
        self.fragmentation = fragmentation;
        self
    }

    pub fn is_fragmented(&self) -> bool {
        self.fragmentation.is_fragmented()
    }
}

impl MessagePart for Header {
    const NAME: &'static str = "Header";
    const ELEMENTS: u32 = 10;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_str(&self.user_name)?;
        w.write_str(&self.message_id)?;
        w.write_int(self.create_time)?;
        w.write_int(self.request_time)?;
        match self.fragmentation {
            Fragmentation::Whole { offset } => {
                w.write_bool(false)?;
                w.write_nil()?;
                w.write_nil()?;
                w.write_opt_int(offset)?;
                w.write_nil()?;
            }
            Fragmentation::Fragment {
                first,
                last,
                offset,
                full_data_size,
            } => {
                w.write_bool(true)?;
                w.write_bool(first)?;
                w.write_bool(last)?;
                w.write_int(offset)?;
                w.write_int(full_data_size)?;
            }
        }
        self.data_type.write(w)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = Header::NAME;
        let user_name = r.read_string("userName", OWNER)?;
        let message_id = r.read_string("messageId", OWNER)?;
        let create_time = r.read_long("createTime", OWNER)?;
        let request_time = r.read_long("requestTime", OWNER)?;
        let is_fragmented = r.read_bool("isFragmented", OWNER)?;
        let first_fragment = r.read_bool("firstFragment", OWNER)?;
        let last_fragment = r.read_bool("lastFragment", OWNER)?;
        let offset = r.read_long("offset", OWNER)?;
        let full_data_size = r.read_long("fullDataSize", OWNER)?;
        let data_type = DataType::read(r, "dataType", OWNER)?;

        Ok(Self {
            user_name: required(user_name, "userName", OWNER)?,
            message_id: required(message_id, "messageId", OWNER)?,
            create_time: required(create_time, "createTime", OWNER)?,
            request_time: required(request_time, "requestTime", OWNER)?,
            fragmentation: Fragmentation::from_flags(
                required(is_fragmented, "isFragmented", OWNER)?,
                first_fragment,
                last_fragment,
                offset,
                full_data_size,
            )?,
            data_type: required(data_type, "dataType", OWNER)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.message_id.is_empty() {
            return Err(ProtocolError::invalid(Self::NAME, "empty messageId"));
        }
        self.fragmentation.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pack(header: &Header) -> Result<bytes::Bytes, ProtocolError> {
        header.validate()?;
        let mut w = ValueWriter::new();
        header.pack_fields(&mut w)?;
        Ok(w.into_bytes())
    }

    fn unpack(bytes: &[u8]) -> Result<Header, ProtocolError> {
        let mut r = ValueReader::new(bytes);
        let header = Header::unpack_fields(&mut r)?;
        header.validate()?;
        Ok(header)
    }

    #[test]
    fn test_header_roundtrip() {
        let header = Header::new("user", "msg-1", DataType::QueryRequest).with_times(1000, 999);
        let decoded = unpack(&pack(&header).unwrap()).unwrap();
        assert_eq!(decoded, header);
        assert!(!decoded.is_fragmented());
    }

    #[test]
    fn test_fragment_header_roundtrip() {
        let header = Header::new("user", "msg-2", DataType::Event).with_fragmentation(
            Fragmentation::Fragment {
                first: false,
                last: true,
                offset: 512,
                full_data_size: 1000,
            },
        );
        let decoded = unpack(&pack(&header).unwrap()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.fragmentation.offset(), Some(512));
    }

    #[test]
    fn test_whole_message_may_carry_offset() {
        let f = Fragmentation::from_flags(false, None, None, Some(0), None).unwrap();
        assert_eq!(f, Fragmentation::Whole { offset: Some(0) });
    }

    #[test]
    fn test_fragment_fields_on_whole_message_rejected() {
        let err = Fragmentation::from_flags(false, Some(true), None, None, None).unwrap_err();
        assert!(err.is_validation());
        let err = Fragmentation::from_flags(false, None, None, None, Some(10)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_fragmented_without_fields_rejected() {
        let err = Fragmentation::from_flags(true, Some(true), Some(false), None, Some(10))
            .unwrap_err();
        assert!(err.is_validation());
        let err = Fragmentation::from_flags(true, None, None, None, None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_fragment_offset_checks() {
        assert!(Fragmentation::from_flags(true, Some(true), Some(false), Some(0), Some(10)).is_ok());
        // first fragment must start at 0
        assert!(
            Fragmentation::from_flags(true, Some(true), Some(false), Some(5), Some(10)).is_err()
        );
        // offset beyond the payload
        assert!(
            Fragmentation::from_flags(true, Some(false), Some(true), Some(10), Some(10)).is_err()
        );
        // announced payload larger than a bin 32 can carry
        assert!(Fragmentation::from_flags(
            true,
            Some(false),
            Some(true),
            Some(i64::MAX - 1),
            Some(i64::MAX)
        )
        .is_err());
    }

    #[test]
    fn test_wire_fragmentation_violation_is_validation_error() {
        // isFragmented=false with a lastFragment value on the wire.
        let mut w = ValueWriter::new();
        w.write_str("user").unwrap();
        w.write_str("msg").unwrap();
        w.write_int(1).unwrap();
        w.write_int(1).unwrap();
        w.write_bool(false).unwrap();
        w.write_nil().unwrap();
        w.write_bool(true).unwrap();
        w.write_nil().unwrap();
        w.write_nil().unwrap();
        w.write_int(10).unwrap();
        let err = unpack(&w.into_bytes()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_missing_message_id() {
        let mut w = ValueWriter::new();
        w.write_str("user").unwrap();
        w.write_nil().unwrap();
        w.write_int(1).unwrap();
        w.write_int(1).unwrap();
        w.write_bool(false).unwrap();
        for _ in 0..4 {
            w.write_nil().unwrap();
        }
        w.write_int(2).unwrap();
        assert!(matches!(
            unpack(&w.into_bytes()),
            Err(ProtocolError::MissingField {
                field: "messageId",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_message_id_rejected_on_encode() {
        let header = Header::new("user", "", DataType::Event);
        assert!(pack(&header).unwrap_err().is_validation());
    }

    #[test]
    fn test_reply_header_echoes_id() {
        let request = Header::new("user", "msg-9", DataType::QueryRequest).with_times(100, 100);
        let reply = request.reply(DataType::QueryRequestAck);
        assert_eq!(reply.message_id, "msg-9");
        assert_eq!(reply.user_name, "user");
        assert_eq!(reply.request_time, 100);
        assert_eq!(reply.data_type, DataType::QueryRequestAck);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Header::with_generated_id("user", DataType::Event);
        let b = Header::with_generated_id("user", DataType::Event);
        assert_ne!(a.message_id, b.message_id);
    }

    proptest! {
        #[test]
        fn prop_fragmentation_invariant(
            is_fragmented in any::<bool>(),
            first in proptest::option::of(any::<bool>()),
            last in proptest::option::of(any::<bool>()),
            offset in proptest::option::of(0i64..100),
            full in proptest::option::of(1i64..200),
        ) {
            let result = Fragmentation::from_flags(is_fragmented, first, last, offset, full);
            if !is_fragmented {
                let absent = first.is_none() && last.is_none() && full.is_none();
                prop_assert_eq!(result.is_ok(), absent);
            } else if first.is_none() || last.is_none() || offset.is_none() || full.is_none() {
                prop_assert!(result.unwrap_err().is_validation());
            }
            if let Err(err) = Fragmentation::from_flags(is_fragmented, first, last, offset, full) {
                prop_assert!(err.is_validation());
            }
        }

        #[test]
        fn prop_header_roundtrip(
            user in "[a-z]{1,12}",
            id in "[a-f0-9-]{1,36}",
            create in any::<i64>(),
            request in any::<i64>(),
            tag in 0i64..13,
            offset in proptest::option::of(any::<i64>()),
        ) {
            let data_type = DataType::from_tag(tag).unwrap();
            let header = Header::new(user, id, data_type)
                .with_times(create, request)
                .with_fragmentation(Fragmentation::Whole { offset });
            let decoded = unpack(&pack(&header).unwrap()).unwrap();
            prop_assert_eq!(decoded, header);
        }
    }
}
