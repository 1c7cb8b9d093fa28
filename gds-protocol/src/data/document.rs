use super::ack::{AckBody, AckData};
use crate::error::ProtocolError;
use crate::holders::{check_rows, EventDocumentResultHolder, FieldHolder};
use crate::part::{required, MessagePart};
use crate::value::{ValueReader, ValueWriter};
use rmpv::Value;
use std::collections::BTreeMap;

/// Bulk insert of rows into one table.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDocumentData {
    pub table_name: String,
    pub field_holders: Vec<FieldHolder>,
    pub records: Vec<Vec<Value>>,
    /// Per-record column names whose stored values the service should return.
    pub returning_options: Option<BTreeMap<i32, Vec<String>>>,
}

impl EventDocumentData {
    pub fn new(table_name: impl Into<String>, field_holders: Vec<FieldHolder>) -> Self {
        Self {
            table_name: table_name.into(),
            field_holders,
            records: Vec::new(),
            returning_options: None,
        }
    }

    pub fn with_record(mut self, record: Vec<Value>) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_returning(mut self, record: i32, fields: Vec<String>) -> Self {
        self.returning_options
            .get_or_insert_with(BTreeMap::new)
            .insert(record, fields);
        self
    }
}

impl MessagePart for EventDocumentData {
    const NAME: &'static str = "EventDocument";
    const ELEMENTS: u32 = 4;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_str(&self.table_name)?;
        w.write_part_list(&self.field_holders)?;
        w.write_value_matrix(&self.records)?;
        w.write_opt(
            self.returning_options.as_ref(),
            ValueWriter::write_map_int_string_list,
        )
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = EventDocumentData::NAME;
        Ok(Self {
            table_name: required(r.read_string("tableName", OWNER)?, "tableName", OWNER)?,
            field_holders: required(
                r.read_part_list("fieldDescriptors", OWNER)?,
                "fieldDescriptors",
                OWNER,
            )?,
            records: required(r.read_value_matrix("records", OWNER)?, "records", OWNER)?,
            returning_options: r.read_map_int_string_list("returningOptions", OWNER)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.table_name.is_empty() {
            return Err(ProtocolError::invalid(Self::NAME, "empty tableName"));
        }
        check_rows(Self::NAME, &self.field_holders, &self.records)?;
        if let Some(options) = &self.returning_options {
            if let Some(index) = options
                .keys()
                .find(|&&index| index < 0 || index as usize >= self.records.len())
            {
                return Err(ProtocolError::invalid(
                    Self::NAME,
                    format!("returning option for record {index} of {}", self.records.len()),
                ));
            }
        }
        Ok(())
    }
}

impl AckBody for Vec<EventDocumentResultHolder> {
    const ACK_NAME: &'static str = "EventDocumentAck";

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

/// Per-record results of an event document.
pub type EventDocumentAckData = AckData<Vec<EventDocumentResultHolder>>;
