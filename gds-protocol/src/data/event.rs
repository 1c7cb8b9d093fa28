use super::ack::{AckBody, AckData};
use crate::error::ProtocolError;
use crate::holders::{EventResultHolder, PriorityLevelHolder};
use crate::part::{required, MessagePart};
use crate::status::AckStatus;
use crate::value::{ValueReader, ValueWriter};
use bytes::Bytes;
use std::collections::BTreeMap;

/// Separator between the statements of an event.
pub const STATEMENT_SEPARATOR: &str = ";";

/// A batch of data-manipulation statements with their binary attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventData {
    pub operations: String,
    pub binary_contents: Option<BTreeMap<String, Bytes>>,
    pub priority_levels: Option<Vec<PriorityLevelHolder>>,
}

impl EventData {
    pub fn new(operations: impl Into<String>) -> Self {
        Self {
            operations: operations.into(),
            binary_contents: None,
            priority_levels: None,
        }
    }

    pub fn from_statements<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = statements
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .collect::<Vec<_>>()
            .join(STATEMENT_SEPARATOR);
        Self::new(joined)
    }

    /// Adds a binary attachment referenced by `name` from the statements.
    pub fn with_attachment(mut self, name: impl Into<String>, content: Bytes) -> Self {
        self.binary_contents
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), content);
        self
    }

    pub fn with_priority_levels(mut self, levels: Vec<PriorityLevelHolder>) -> Self {
        self.priority_levels = Some(levels);
        self
    }

    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.operations
            .split(STATEMENT_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl MessagePart for EventData {
    const NAME: &'static str = "Event";
    const ELEMENTS: u32 = 3;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_str(&self.operations)?;
        w.write_opt(self.binary_contents.as_ref(), ValueWriter::write_map_string_binary)?;
        w.write_opt(self.priority_levels.as_deref(), PriorityLevelHolder::write_list)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = EventData::NAME;
        Ok(Self {
            operations: required(r.read_string("operations", OWNER)?, "operations", OWNER)?,
            binary_contents: r.read_map_string_binary("binaryContents", OWNER)?,
            priority_levels: PriorityLevelHolder::read_list(r, "priorityLevels", OWNER)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.statements().next().is_none() {
            return Err(ProtocolError::invalid(Self::NAME, "no statements"));
        }
        Ok(())
    }
}

impl AckBody for Vec<EventResultHolder> {
    const ACK_NAME: &'static str = "EventAck";

    fn write_body(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_part_list(self)
    }

    fn read_body(
        r: &mut ValueReader<'_>,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Self>, ProtocolError> {
        r.read_part_list(field, owner)
    }
}

/// Per-statement results of an event.
pub type EventAckData = AckData<Vec<EventResultHolder>>;

impl EventAckData {
    /// Returns whether the event and every one of its statements succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.global_status.is_success()
            && self
                .ack_data
                .iter()
                .flatten()
                .all(|result| result.status.is_success())
    }

    pub fn failed_statements(&self) -> impl Iterator<Item = (usize, &EventResultHolder)> {
        self.ack_data
            .iter()
            .flatten()
            .enumerate()
            .filter(|(_, result)| !result.status.is_success())
    }

    pub fn statement_count(&self) -> usize {
        self.ack_data.as_ref().map_or(0, Vec::len)
    }
}

impl Default for EventAckData {
    fn default() -> Self {
        Self::new(AckStatus::Ok, Vec::new())
    }
}
