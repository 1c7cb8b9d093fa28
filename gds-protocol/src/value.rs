//! Strict reader and writer for the wire's MessagePack value format.
//!
//! Every read names the field being decoded and the part that owns it, and
//! fails with [`ProtocolError::TypeMismatch`] when the wire type differs from
//! the expected one. A nil value is always accepted and reads as `None`;
//! whether a field may be absent is decided later by the owner's content check.

use crate::error::ProtocolError;
use crate::part::MessagePart;
use bytes::Bytes;
use rmp::Marker;
use rmpv::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Largest length a string, binary, array or map header can announce.
pub const MAX_CONTAINER_LEN: usize = u32::MAX as usize;

/// Wire value families, as seen by a reader peeking at the next marker byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Nil,
    Boolean,
    Integer,
    Float,
    String,
    Binary,
    Array,
    Map,
    Extension,
}

impl ValueType {
    /// Classifies a marker. Returns `None` for the reserved marker byte.
    pub fn from_marker(marker: Marker) -> Option<Self> {
        let value_type = match marker {
            Marker::Null => ValueType::Nil,
            Marker::True | Marker::False => ValueType::Boolean,
            Marker::FixPos(_)
            | Marker::FixNeg(_)
            | Marker::U8
            | Marker::U16
            | Marker::U32
            | Marker::U64
            | Marker::I8
            | Marker::I16
            | Marker::I32
            | Marker::I64 => ValueType::Integer,
            Marker::F32 | Marker::F64 => ValueType::Float,
            Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => ValueType::String,
            Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => ValueType::Binary,
            Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => ValueType::Array,
            Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => ValueType::Map,
            Marker::FixExt1
            | Marker::FixExt2
            | Marker::FixExt4
            | Marker::FixExt8
            | Marker::FixExt16
            | Marker::Ext8
            | Marker::Ext16
            | Marker::Ext32 => ValueType::Extension,
            Marker::Reserved => return None,
        };
        Some(value_type)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Nil => "NIL",
            ValueType::Boolean => "BOOLEAN",
            ValueType::Integer => "INTEGER",
            ValueType::Float => "FLOAT",
            ValueType::String => "STRING",
            ValueType::Binary => "BINARY",
            ValueType::Array => "ARRAY",
            ValueType::Map => "MAP",
            ValueType::Extension => "EXTENSION",
        };
        f.write_str(name)
    }
}

fn check_len(len: usize) -> Result<u32, ProtocolError> {
    if len > MAX_CONTAINER_LEN {
        return Err(ProtocolError::TooLarge {
            size: len,
            max: MAX_CONTAINER_LEN,
        });
    }
    Ok(len as u32)
}

/// Appends tagged wire values to an in-memory buffer.
#[derive(Debug, Default)]
pub struct ValueWriter {
    buf: Vec<u8>,
}

impl ValueWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }

    /// Appends already-encoded bytes unchanged.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_nil(&mut self) -> Result<(), ProtocolError> {
        rmp::encode::write_nil(&mut self.buf)?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        rmp::encode::write_bool(&mut self.buf, value)?;
        Ok(())
    }

    pub fn write_int(&mut self, value: i64) -> Result<(), ProtocolError> {
        rmp::encode::write_sint(&mut self.buf, value)?;
        Ok(())
    }

    pub fn write_str(&mut self, value: &str) -> Result<(), ProtocolError> {
        check_len(value.len())?;
        rmp::encode::write_str(&mut self.buf, value)?;
        Ok(())
    }

    pub fn write_bin(&mut self, value: &[u8]) -> Result<(), ProtocolError> {
        check_len(value.len())?;
        rmp::encode::write_bin(&mut self.buf, value)?;
        Ok(())
    }

    pub fn write_array_len(&mut self, len: usize) -> Result<(), ProtocolError> {
        rmp::encode::write_array_len(&mut self.buf, check_len(len)?)?;
        Ok(())
    }

    pub fn write_map_len(&mut self, len: usize) -> Result<(), ProtocolError> {
        rmp::encode::write_map_len(&mut self.buf, check_len(len)?)?;
        Ok(())
    }

    /// Writes an arbitrary dynamically-typed value.
    pub fn write_value(&mut self, value: &Value) -> Result<(), ProtocolError> {
        rmpv::encode::write_value(&mut self.buf, value).map_err(|e| {
            ProtocolError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })
    }

    /// Writes `value` with `write`, or a nil marker when absent.
    pub fn write_opt<T>(
        &mut self,
        value: Option<T>,
        write: impl FnOnce(&mut Self, T) -> Result<(), ProtocolError>,
    ) -> Result<(), ProtocolError> {
        match value {
            Some(value) => write(self, value),
            None => self.write_nil(),
        }
    }

    pub fn write_opt_bool(&mut self, value: Option<bool>) -> Result<(), ProtocolError> {
        self.write_opt(value, Self::write_bool)
    }

    pub fn write_opt_int(&mut self, value: Option<i64>) -> Result<(), ProtocolError> {
        self.write_opt(value, Self::write_int)
    }

    pub fn write_opt_str(&mut self, value: Option<&str>) -> Result<(), ProtocolError> {
        self.write_opt(value, Self::write_str)
    }

    pub fn write_opt_bin(&mut self, value: Option<&[u8]>) -> Result<(), ProtocolError> {
        self.write_opt(value, Self::write_bin)
    }

    pub fn write_string_list(&mut self, values: &[String]) -> Result<(), ProtocolError> {
        self.write_array_len(values.len())?;
        for value in values {
            self.write_str(value)?;
        }
        Ok(())
    }

    pub fn write_value_list(&mut self, values: &[Value]) -> Result<(), ProtocolError> {
        self.write_array_len(values.len())?;
        for value in values {
            self.write_value(value)?;
        }
        Ok(())
    }

    pub fn write_value_matrix(&mut self, rows: &[Vec<Value>]) -> Result<(), ProtocolError> {
        self.write_array_len(rows.len())?;
        for row in rows {
            self.write_value_list(row)?;
        }
        Ok(())
    }

    pub fn write_map_string_binary(
        &mut self,
        map: &BTreeMap<String, Bytes>,
    ) -> Result<(), ProtocolError> {
        self.write_map_len(map.len())?;
        for (key, value) in map {
            self.write_str(key)?;
            self.write_bin(value)?;
        }
        Ok(())
    }

    pub fn write_map_string_value(
        &mut self,
        map: &BTreeMap<String, Value>,
    ) -> Result<(), ProtocolError> {
        self.write_map_len(map.len())?;
        for (key, value) in map {
            self.write_str(key)?;
            self.write_value(value)?;
        }
        Ok(())
    }

    pub fn write_map_int_bool(&mut self, map: &BTreeMap<i32, bool>) -> Result<(), ProtocolError> {
        self.write_map_len(map.len())?;
        for (key, value) in map {
            self.write_int(i64::from(*key))?;
            self.write_bool(*value)?;
        }
        Ok(())
    }

    pub fn write_map_int_string(
        &mut self,
        map: &BTreeMap<i32, String>,
    ) -> Result<(), ProtocolError> {
        self.write_map_len(map.len())?;
        for (key, value) in map {
            self.write_int(i64::from(*key))?;
            self.write_str(value)?;
        }
        Ok(())
    }

    pub fn write_map_int_string_list(
        &mut self,
        map: &BTreeMap<i32, Vec<String>>,
    ) -> Result<(), ProtocolError> {
        self.write_map_len(map.len())?;
        for (key, values) in map {
            self.write_int(i64::from(*key))?;
            self.write_string_list(values)?;
        }
        Ok(())
    }

    /// Writes a nested part as its own count-prefixed sequence.
    pub fn write_part<T: MessagePart>(&mut self, part: &T) -> Result<(), ProtocolError> {
        part.validate()?;
        self.write_array_len(T::ELEMENTS as usize)?;
        part.pack_fields(self)
    }

    pub fn write_opt_part<T: MessagePart>(&mut self, part: Option<&T>) -> Result<(), ProtocolError> {
        self.write_opt(part, Self::write_part::<T>)
    }

    pub fn write_part_list<T: MessagePart>(&mut self, parts: &[T]) -> Result<(), ProtocolError> {
        self.write_array_len(parts.len())?;
        for part in parts {
            self.write_part(part)?;
        }
        Ok(())
    }
}

/// Reads tagged wire values from a byte slice, checking each against the
/// type the caller expects.
#[derive(Debug, Clone)]
pub struct ValueReader<'a> {
    rd: &'a [u8],
    total: usize,
}

impl<'a> ValueReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            rd: bytes,
            total: bytes.len(),
        }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.total - self.rd.len()
    }

    pub fn remaining(&self) -> usize {
        self.rd.len()
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(&self) -> Result<(), ProtocolError> {
        if self.rd.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::TrailingBytes(self.rd.len()))
        }
    }

    /// Returns the type of the next value without consuming it.
    pub fn peek_type(&self) -> Result<ValueType, ProtocolError> {
        let byte = *self.rd.first().ok_or(ProtocolError::UnexpectedEof)?;
        ValueType::from_marker(Marker::from_u8(byte))
            .ok_or_else(|| ProtocolError::Malformed(format!("reserved marker byte {byte:#04x}")))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.rd.len() < len {
            return Err(ProtocolError::UnexpectedEof);
        }
        let (head, tail) = self.rd.split_at(len);
        self.rd = tail;
        Ok(head)
    }

    /// Consumes a nil marker if one is next. Otherwise checks the next value
    /// has the expected type and leaves it unread.
    fn begin(
        &mut self,
        field: &'static str,
        owner: &'static str,
        expected: ValueType,
    ) -> Result<bool, ProtocolError> {
        let found = self.peek_type()?;
        if found == ValueType::Nil {
            self.take(1)?;
            return Ok(false);
        }
        if found != expected {
            return Err(ProtocolError::TypeMismatch {
                field,
                owner,
                found,
                expected,
            });
        }
        Ok(true)
    }

    pub fn read_bool(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<bool>, ProtocolError> {
        if !self.begin(field, owner, ValueType::Boolean)? {
            return Ok(None);
        }
        let value = rmp::decode::read_bool(&mut self.rd).map_err(ProtocolError::malformed)?;
        Ok(Some(value))
    }

    pub fn read_long(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<i64>, ProtocolError> {
        if !self.begin(field, owner, ValueType::Integer)? {
            return Ok(None);
        }
        let value =
            rmp::decode::read_int::<i64, _>(&mut self.rd).map_err(ProtocolError::malformed)?;
        Ok(Some(value))
    }

    pub fn read_int(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<i32>, ProtocolError> {
        match self.read_long(field, owner)? {
            Some(value) => i32::try_from(value)
                .map(Some)
                .map_err(|_| ProtocolError::IntegerOutOfRange {
                    field,
                    owner,
                    value,
                }),
            None => Ok(None),
        }
    }

    pub fn read_string(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<String>, ProtocolError> {
        if !self.begin(field, owner, ValueType::String)? {
            return Ok(None);
        }
        let len = rmp::decode::read_str_len(&mut self.rd).map_err(ProtocolError::malformed)?;
        let bytes = self.take(len as usize)?;
        let value = std::str::from_utf8(bytes).map_err(ProtocolError::malformed)?;
        Ok(Some(value.to_string()))
    }

    pub fn read_binary(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Bytes>, ProtocolError> {
        if !self.begin(field, owner, ValueType::Binary)? {
            return Ok(None);
        }
        let len = rmp::decode::read_bin_len(&mut self.rd).map_err(ProtocolError::malformed)?;
        let bytes = self.take(len as usize)?;
        Ok(Some(Bytes::copy_from_slice(bytes)))
    }

    /// Reads an array header. Accepts the fixarray, array16 and array32 forms.
    pub fn read_array_header(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<u32>, ProtocolError> {
        if !self.begin(field, owner, ValueType::Array)? {
            return Ok(None);
        }
        let len = rmp::decode::read_array_len(&mut self.rd).map_err(ProtocolError::malformed)?;
        Ok(Some(len))
    }

    pub fn read_map_header(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<u32>, ProtocolError> {
        if !self.begin(field, owner, ValueType::Map)? {
            return Ok(None);
        }
        let len = rmp::decode::read_map_len(&mut self.rd).map_err(ProtocolError::malformed)?;
        Ok(Some(len))
    }

    /// Reads an array header that must announce exactly `expected` elements.
    /// Nil is not accepted here.
    pub fn expect_array(&mut self, expected: u32, owner: &'static str) -> Result<(), ProtocolError> {
        let found = self.peek_type()?;
        if found != ValueType::Array {
            return Err(ProtocolError::TypeMismatch {
                field: "<sequence>",
                owner,
                found,
                expected: ValueType::Array,
            });
        }
        let len = rmp::decode::read_array_len(&mut self.rd).map_err(ProtocolError::malformed)?;
        if len != expected {
            return Err(ProtocolError::ElementCount {
                owner,
                expected,
                found: len,
            });
        }
        Ok(())
    }

    /// Reads any value. Nil reads as [`Value::Nil`].
    pub fn read_value(&mut self) -> Result<Value, ProtocolError> {
        self.peek_type()?;
        rmpv::decode::read_value(&mut self.rd).map_err(ProtocolError::malformed)
    }

    /// Reads a value that must be non-nil, for positions inside composite values.
    fn read_required<T>(
        &mut self,
        field: &'static str,
        owner: &'static str,
        read: impl FnOnce(&mut Self, &'static str, &'static str) -> Result<Option<T>, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        read(self, field, owner)?.ok_or(ProtocolError::MissingField { field, owner })
    }

    pub fn read_string_list(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Vec<String>>, ProtocolError> {
        let Some(len) = self.read_array_header(field, owner)? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(len.min(1024) as usize);
        for _ in 0..len {
            values.push(self.read_required(field, owner, Self::read_string)?);
        }
        Ok(Some(values))
    }

    pub fn read_value_list(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Vec<Value>>, ProtocolError> {
        let Some(len) = self.read_array_header(field, owner)? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(len.min(1024) as usize);
        for _ in 0..len {
            values.push(self.read_value()?);
        }
        Ok(Some(values))
    }

    pub fn read_value_matrix(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Vec<Vec<Value>>>, ProtocolError> {
        let Some(len) = self.read_array_header(field, owner)? else {
            return Ok(None);
        };
        let mut rows = Vec::with_capacity(len.min(1024) as usize);
        for _ in 0..len {
            rows.push(self.read_required(field, owner, Self::read_value_list)?);
        }
        Ok(Some(rows))
    }

    fn read_map<K: Ord, V>(
        &mut self,
        field: &'static str,
        owner: &'static str,
        mut read_entry: impl FnMut(&mut Self) -> Result<(K, V), ProtocolError>,
    ) -> Result<Option<BTreeMap<K, V>>, ProtocolError> {
        let Some(len) = self.read_map_header(field, owner)? else {
            return Ok(None);
        };
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let (key, value) = read_entry(self)?;
            map.insert(key, value);
        }
        Ok(Some(map))
    }

    pub fn read_map_string_binary(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<BTreeMap<String, Bytes>>, ProtocolError> {
        self.read_map(field, owner, |r| {
            let key = r.read_required(field, owner, Self::read_string)?;
            let value = r.read_required(field, owner, Self::read_binary)?;
            Ok((key, value))
        })
    }

    pub fn read_map_string_value(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<BTreeMap<String, Value>>, ProtocolError> {
        self.read_map(field, owner, |r| {
            let key = r.read_required(field, owner, Self::read_string)?;
            let value = r.read_value()?;
            Ok((key, value))
        })
    }

    pub fn read_map_int_bool(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<BTreeMap<i32, bool>>, ProtocolError> {
        self.read_map(field, owner, |r| {
            let key = r.read_required(field, owner, Self::read_int)?;
            let value = r.read_required(field, owner, Self::read_bool)?;
            Ok((key, value))
        })
    }

    pub fn read_map_int_string(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<BTreeMap<i32, String>>, ProtocolError> {
        self.read_map(field, owner, |r| {
            let key = r.read_required(field, owner, Self::read_int)?;
            let value = r.read_required(field, owner, Self::read_string)?;
            Ok((key, value))
        })
    }

    pub fn read_map_int_string_list(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<BTreeMap<i32, Vec<String>>>, ProtocolError> {
        self.read_map(field, owner, |r| {
            let key = r.read_required(field, owner, Self::read_int)?;
            let value = r.read_required(field, owner, Self::read_string_list)?;
            Ok((key, value))
        })
    }

    /// Reads a nested part from its own count-prefixed sequence and runs its
    /// content check.
    pub fn read_part<T: MessagePart>(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<T>, ProtocolError> {
        if !self.begin(field, owner, ValueType::Array)? {
            return Ok(None);
        }
        self.expect_array(T::ELEMENTS, T::NAME)?;
        let part = T::unpack_fields(self)?;
        part.validate()?;
        Ok(Some(part))
    }

    pub fn read_part_list<T: MessagePart>(
        &mut self,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Vec<T>>, ProtocolError> {
        let Some(len) = self.read_array_header(field, owner)? else {
            return Ok(None);
        };
        let mut parts = Vec::with_capacity(len.min(1024) as usize);
        for _ in 0..len {
            parts.push(self.read_required(field, owner, Self::read_part::<T>)?);
        }
        Ok(Some(parts))
    }
}
