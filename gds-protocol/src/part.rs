//! Message part framing.
//!
//! A message part is anything packed positionally into a count-prefixed
//! sequence: the header, every data variant and every nested holder record.
//! Parts only know how to pack and unpack their own fields in order; the
//! sequence header around them is written by whoever embeds them.

use crate::error::ProtocolError;
use crate::value::{ValueReader, ValueWriter};
use bytes::Bytes;
use std::fmt;
use std::sync::OnceLock;

/// A positionally-packed record.
pub trait MessagePart: Sized {
    /// Type name used in decode errors.
    const NAME: &'static str;

    /// Number of elements this part contributes to its enclosing sequence.
    const ELEMENTS: u32;

    /// Packs the fields in wire order, without a sequence header.
    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError>;

    /// Unpacks the fields in wire order, without a sequence header.
    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError>;

    /// Content check run after every decode and before every encode.
    fn validate(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Serializes the part as a standalone count-prefixed sequence.
    fn to_bytes(&self) -> Result<Bytes, ProtocolError> {
        let mut w = ValueWriter::new();
        w.write_part(self)?;
        Ok(w.into_bytes())
    }

    /// Serialized size of [`MessagePart::to_bytes`].
    fn size(&self) -> Result<usize, ProtocolError> {
        Ok(self.to_bytes()?.len())
    }

    /// Decodes a standalone count-prefixed sequence. The whole input must be consumed.
    fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = ValueReader::new(bytes);
        r.expect_array(Self::ELEMENTS, Self::NAME)?;
        let part = Self::unpack_fields(&mut r)?;
        r.finish()?;
        part.validate()?;
        Ok(part)
    }
}

/// Unwraps a field that the wire allows to be nil but the owner requires.
pub(crate) fn required<T>(
    value: Option<T>,
    field: &'static str,
    owner: &'static str,
) -> Result<T, ProtocolError> {
    value.ok_or(ProtocolError::MissingField { field, owner })
}

/// Lazily filled cache of a part's encoded form.
///
/// Ignored by equality so that a decoded value compares equal to the value
/// it was encoded from.
#[derive(Clone, Default)]
pub struct RawCache(OnceLock<Bytes>);

impl RawCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache already holding `bytes`.
    pub fn filled(bytes: Bytes) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(bytes);
        Self(cell)
    }

    pub fn get(&self) -> Option<&Bytes> {
        self.0.get()
    }

    /// Returns the cached bytes, running `encode` on first use.
    pub fn get_or_encode(
        &self,
        encode: impl FnOnce() -> Result<Bytes, ProtocolError>,
    ) -> Result<Bytes, ProtocolError> {
        if let Some(bytes) = self.0.get() {
            return Ok(bytes.clone());
        }
        let bytes = encode()?;
        Ok(self.0.get_or_init(|| bytes).clone())
    }
}

impl PartialEq for RawCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl fmt::Debug for RawCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            Some(bytes) => write!(f, "RawCache({} bytes)", bytes.len()),
            None => write!(f, "RawCache(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pair {
        name: String,
        count: i64,
    }

    impl MessagePart for Pair {
        const NAME: &'static str = "Pair";
        const ELEMENTS: u32 = 2;

        fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
            w.write_str(&self.name)?;
            w.write_int(self.count)
        }

        fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
            Ok(Self {
                name: required(r.read_string("name", Self::NAME)?, "name", Self::NAME)?,
                count: required(r.read_long("count", Self::NAME)?, "count", Self::NAME)?,
            })
        }

        fn validate(&self) -> Result<(), ProtocolError> {
            if self.count < 0 {
                return Err(ProtocolError::invalid(Self::NAME, "negative count"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_part_bytes_roundtrip() {
        let pair = Pair {
            name: "hits".to_string(),
            count: 3,
        };
        let bytes = pair.to_bytes().unwrap();
        // fixarray(2) + fixstr(4) "hits" + fixint 3
        assert_eq!(bytes.as_ref(), b"\x92\xa4hits\x03");
        assert_eq!(pair.size().unwrap(), 7);
        assert_eq!(Pair::from_bytes(&bytes).unwrap(), pair);
    }

    #[test]
    fn test_part_validation_on_encode_and_decode() {
        let pair = Pair {
            name: "hits".to_string(),
            count: -1,
        };
        assert!(pair.to_bytes().unwrap_err().is_validation());

        let err = Pair::from_bytes(b"\x92\xa4hits\xff").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_part_wrong_count() {
        let err = Pair::from_bytes(b"\x93\xa4hits\x03\xc0").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ElementCount {
                owner: "Pair",
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn test_missing_required_field() {
        let err = Pair::from_bytes(b"\x92\xc0\x03").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MissingField {
                field: "name",
                owner: "Pair"
            }
        ));
    }

    #[test]
    fn test_raw_cache() {
        let cache = RawCache::new();
        assert!(cache.get().is_none());

        let first = cache
            .get_or_encode(|| Ok(Bytes::from_static(b"abc")))
            .unwrap();
        assert_eq!(first.as_ref(), b"abc");

        // The encoder is not called again once filled.
        let second = cache
            .get_or_encode(|| panic!("encoder called twice"))
            .unwrap();
        assert_eq!(second, first);

        let filled = RawCache::filled(Bytes::from_static(b"xyz"));
        assert_eq!(filled.get().map(|b| b.as_ref()), Some(&b"xyz"[..]));
        assert_eq!(cache, filled);
    }
}
