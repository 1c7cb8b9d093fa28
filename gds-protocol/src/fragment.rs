//! Reassembly of fragmented payloads.

use crate::error::ProtocolError;
use crate::header::{Fragmentation, Header};
use crate::manager::MessageManager;
use crate::message::Message;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;

/// Largest payload the assembler will buffer by default (64 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Most incomplete messages the assembler holds at once by default.
pub const DEFAULT_MAX_PENDING: usize = 16;

const OWNER: &str = "Fragment";

/// One slice of a fragmented payload, as received.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub header: Header,
    pub chunk: Bytes,
}

impl Fragment {
    pub fn new(header: Header, chunk: Bytes) -> Result<Self, ProtocolError> {
        match header.fragmentation {
            Fragmentation::Fragment {
                offset,
                full_data_size,
                ..
            } => {
                let end = i64::try_from(chunk.len())
                    .ok()
                    .and_then(|len| offset.checked_add(len));
                match end {
                    Some(end) if offset >= 0 && end <= full_data_size => Ok(Self { header, chunk }),
                    _ => Err(ProtocolError::invalid(
                        OWNER,
                        "slice extends past fullDataSize",
                    )),
                }
            }
            Fragmentation::Whole { .. } => {
                Err(ProtocolError::invalid(OWNER, "header is not a fragment header"))
            }
        }
    }
}

#[derive(Debug)]
struct Partial {
    header: Header,
    full_data_size: usize,
    buf: BytesMut,
}

/// Collects fragments per message id and decodes the payload once the last
/// slice arrives.
///
/// Slices must arrive in order. A slice that does not continue the buffered
/// payload drops the whole message. Buffers grow with the slices received,
/// and a first slice is refused while `max_pending` messages are incomplete.
#[derive(Debug)]
pub struct FragmentAssembler {
    pending: HashMap<String, Partial>,
    max_payload_size: usize,
    max_pending: usize,
}

impl FragmentAssembler {
    pub fn new() -> Self {
        Self::with_max_payload_size(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload_size(max_payload_size: usize) -> Self {
        Self {
            pending: HashMap::new(),
            max_payload_size,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Bytes currently buffered across all incomplete messages.
    pub fn buffered(&self) -> usize {
        self.pending.values().map(|partial| partial.buf.len()).sum()
    }

    /// Number of messages with slices buffered.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drops any buffered slices of `message_id`.
    pub fn discard(&mut self, message_id: &str) -> bool {
        self.pending.remove(message_id).is_some()
    }

    /// Buffers a slice. Returns the complete message when `fragment` is the last slice.
    pub fn push(&mut self, fragment: Fragment) -> Result<Option<Message>, ProtocolError> {
        let Fragment { header, chunk } = fragment;
        let Fragmentation::Fragment {
            first,
            last,
            offset,
            full_data_size,
        } = header.fragmentation
        else {
            return Err(ProtocolError::invalid(OWNER, "header is not a fragment header"));
        };
        let full_data_size = full_data_size as usize;
        let message_id = header.message_id.clone();

        if first {
            if full_data_size > self.max_payload_size {
                return Err(ProtocolError::TooLarge {
                    size: full_data_size,
                    max: self.max_payload_size,
                });
            }
            // a restarted message replaces its own entry
            self.pending.remove(&message_id);
            if self.pending.len() >= self.max_pending {
                return Err(ProtocolError::invalid(
                    OWNER,
                    format!(
                        "{} incomplete messages buffered, refusing {message_id}",
                        self.pending.len()
                    ),
                ));
            }
            let partial = Partial {
                header: header.clone(),
                full_data_size,
                buf: BytesMut::with_capacity(chunk.len()),
            };
            self.pending.insert(message_id.clone(), partial);
        }

        let Some(partial) = self.pending.get_mut(&message_id) else {
            return Err(ProtocolError::invalid(
                OWNER,
                format!("slice at offset {offset} of {message_id} without a first slice"),
            ));
        };

        if let Err(err) = check_continuation(partial, &header, offset as usize, full_data_size) {
            self.pending.remove(&message_id);
            return Err(err);
        }
        partial.buf.extend_from_slice(&chunk);

        if !last {
            if partial.buf.len() >= partial.full_data_size {
                self.pending.remove(&message_id);
                return Err(ProtocolError::invalid(
                    OWNER,
                    "payload complete before the last slice",
                ));
            }
            return Ok(None);
        }

        let Some(partial) = self.pending.remove(&message_id) else {
            return Ok(None);
        };
        if partial.buf.len() != partial.full_data_size {
            return Err(ProtocolError::invalid(
                OWNER,
                format!(
                    "last slice ends at {} of {} bytes",
                    partial.buf.len(),
                    partial.full_data_size
                ),
            ));
        }

        let header = partial.header.with_fragmentation(Fragmentation::default());
        let data = MessageManager::decode_partial_data(&partial.buf, header.data_type)?;
        Message::new(header, data).map(Some)
    }
}

impl Default for FragmentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn check_continuation(
    partial: &Partial,
    header: &Header,
    offset: usize,
    full_data_size: usize,
) -> Result<(), ProtocolError> {
    if offset != partial.buf.len() {
        return Err(ProtocolError::invalid(
            OWNER,
            format!(
                "slice at offset {offset}, expected {}",
                partial.buf.len()
            ),
        ));
    }
    if full_data_size != partial.full_data_size || header.data_type != partial.header.data_type {
        return Err(ProtocolError::invalid(
            OWNER,
            "slice disagrees with the first slice on payload size or type",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Data, DataType, EventData};
    use crate::manager::Inbound;
    use crate::value::ValueWriter;

    fn slices(unit: usize) -> (Data, Vec<Fragment>) {
        let data: Data = EventData::new("INSERT INTO t (id) VALUES ('x')")
            .with_attachment("x", Bytes::from(vec![3u8; 250]))
            .into();
        let header = Header::new("user", "frag-1", DataType::Event);
        let fragments = MessageManager::fragment(&header, &data, unit)
            .unwrap()
            .into_iter()
            .map(|bytes| match MessageManager::decode(bytes).unwrap() {
                Inbound::Fragment(fragment) => fragment,
                Inbound::Message(_) => panic!("expected a fragment"),
            })
            .collect();
        (data, fragments)
    }

    #[test]
    fn test_reassembly() {
        let (data, fragments) = slices(64);
        assert!(fragments.len() > 2);

        let mut assembler = FragmentAssembler::new();
        let count = fragments.len();
        for (index, fragment) in fragments.into_iter().enumerate() {
            let result = assembler.push(fragment).unwrap();
            if index + 1 < count {
                assert!(result.is_none());
                assert_eq!(assembler.pending(), 1);
            } else {
                let message = result.unwrap();
                assert_eq!(message.data(), &data);
                assert_eq!(message.message_id(), "frag-1");
                assert!(!message.header().is_fragmented());
            }
        }
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_out_of_order_slice_drops_message() {
        let (_, fragments) = slices(64);
        let mut assembler = FragmentAssembler::new();
        assembler.push(fragments[0].clone()).unwrap();
        let err = assembler.push(fragments[2].clone()).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_slice_without_first() {
        let (_, fragments) = slices(64);
        let mut assembler = FragmentAssembler::new();
        assert!(assembler.push(fragments[1].clone()).is_err());
    }

    #[test]
    fn test_payload_size_limit() {
        let (_, fragments) = slices(64);
        let mut assembler = FragmentAssembler::with_max_payload_size(100);
        assert!(matches!(
            assembler.push(fragments[0].clone()),
            Err(ProtocolError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_discard() {
        let (_, fragments) = slices(64);
        let mut assembler = FragmentAssembler::new();
        assembler.push(fragments[0].clone()).unwrap();
        assert!(assembler.discard("frag-1"));
        assert!(!assembler.discard("frag-1"));
    }

    #[test]
    fn test_pending_limit() {
        let (_, fragments) = slices(64);
        let mut assembler = FragmentAssembler::new().with_max_pending(2);
        for id in ["a", "b"] {
            let mut first = fragments[0].clone();
            first.header.message_id = id.to_string();
            assert!(assembler.push(first).unwrap().is_none());
        }

        let mut third = fragments[0].clone();
        third.header.message_id = "c".to_string();
        let err = assembler.push(third).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(assembler.pending(), 2);

        // a restarted message does not count twice
        let mut again = fragments[0].clone();
        again.header.message_id = "a".to_string();
        assert!(assembler.push(again).unwrap().is_none());
        assert_eq!(assembler.pending(), 2);

        assembler.discard("b");
        let mut third = fragments[0].clone();
        third.header.message_id = "c".to_string();
        assert!(assembler.push(third).unwrap().is_none());
    }

    #[test]
    fn test_buffers_grow_with_slices() {
        let (_, fragments) = slices(64);
        let mut assembler = FragmentAssembler::new();
        let first_len = fragments[0].chunk.len();
        assembler.push(fragments[0].clone()).unwrap();
        assert_eq!(assembler.buffered(), first_len);
        assembler.push(fragments[1].clone()).unwrap();
        assert_eq!(assembler.buffered(), first_len + fragments[1].chunk.len());
    }

    #[test]
    fn test_slice_end_overflow_rejected() {
        let header = Header::new("user", "huge", DataType::Event).with_fragmentation(
            Fragmentation::Fragment {
                first: false,
                last: true,
                offset: i64::MAX - 1,
                full_data_size: i64::MAX,
            },
        );
        let err = Fragment::new(header, Bytes::from_static(b"0123456789")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_decode_rejects_oversized_fragment_header() {
        let mut w = ValueWriter::new();
        w.write_array_len(11).unwrap();
        w.write_str("user").unwrap();
        w.write_str("huge").unwrap();
        w.write_int(1).unwrap();
        w.write_int(1).unwrap();
        w.write_bool(true).unwrap();
        w.write_bool(false).unwrap();
        w.write_bool(true).unwrap();
        w.write_int(i64::MAX - 1).unwrap();
        w.write_int(i64::MAX).unwrap();
        w.write_int(DataType::Event.tag()).unwrap();
        w.write_bin(b"0123456789").unwrap();

        let err = MessageManager::decode(w.into_bytes()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_fragment_requires_fragment_header() {
        let header = Header::new("user", "m", DataType::Event);
        assert!(Fragment::new(header, Bytes::from_static(b"x")).is_err());
    }
}
