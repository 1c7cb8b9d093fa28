//! Structured sub-records nested inside data payloads.

use crate::error::ProtocolError;
use crate::part::{required, MessagePart};
use crate::status::AckStatus;
use crate::value::{ValueReader, ValueWriter};
use bytes::Bytes;
use rmpv::Value;
use std::collections::BTreeMap;
use std::fmt;

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $error:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            pub fn parse(value: &str) -> Result<Self, ProtocolError> {
                match value {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ProtocolError::$error(other.to_string())),
                }
            }

            pub(crate) fn read(
                r: &mut ValueReader<'_>,
                field: &'static str,
                owner: &'static str,
            ) -> Result<Option<Self>, ProtocolError> {
                r.read_string(field, owner)?
                    .map(|value| Self::parse(&value))
                    .transpose()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Column types declared by field descriptors.
    FieldValueType, UnknownFieldType {
        Keyword => "KEYWORD",
        Text => "TEXT",
        Boolean => "BOOLEAN",
        Integer => "INTEGER",
        Long => "LONG",
        Double => "DOUBLE",
        StringMap => "STRING_MAP",
        KeywordArray => "KEYWORD_ARRAY",
        TextArray => "TEXT_ARRAY",
        BooleanArray => "BOOLEAN_ARRAY",
        IntegerArray => "INTEGER_ARRAY",
        LongArray => "LONG_ARRAY",
        DoubleArray => "DOUBLE_ARRAY",
        Binary => "BINARY",
        BinaryArray => "BINARY_ARRAY",
    }
}

string_enum! {
    /// Consistency mode of a paged query.
    ConsistencyType, UnknownConsistencyType {
        None => "NONE",
        Pages => "PAGES",
        PagesConsistent => "PAGES_CONSISTENT",
    }
}

/// Rejects rows whose width differs from the number of field descriptors.
pub(crate) fn check_rows(
    owner: &'static str,
    descriptors: &[FieldHolder],
    rows: &[Vec<Value>],
) -> Result<(), ProtocolError> {
    if let Some((index, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != descriptors.len())
    {
        return Err(ProtocolError::invalid(
            owner,
            format!(
                "row {} has {} values for {} field descriptors",
                index,
                row.len(),
                descriptors.len()
            ),
        ));
    }
    Ok(())
}

/// Describes one column: name, type and MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHolder {
    pub field_name: String,
    pub field_type: FieldValueType,
    pub mime_type: String,
}

impl FieldHolder {
    pub fn new(
        field_name: impl Into<String>,
        field_type: FieldValueType,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            field_type,
            mime_type: mime_type.into(),
        }
    }
}

impl MessagePart for FieldHolder {
    const NAME: &'static str = "FieldHolder";
    const ELEMENTS: u32 = 3;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_str(&self.field_name)?;
        w.write_str(self.field_type.as_str())?;
        w.write_str(&self.mime_type)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = FieldHolder::NAME;
        Ok(Self {
            field_name: required(r.read_string("fieldName", OWNER)?, "fieldName", OWNER)?,
            field_type: required(
                FieldValueType::read(r, "fieldType", OWNER)?,
                "fieldType",
                OWNER,
            )?,
            mime_type: required(r.read_string("mimeType", OWNER)?, "mimeType", OWNER)?,
        })
    }
}

/// One priority level of an event: per-operation flags keyed by operation index.
///
/// Unlike the other holders this one is a variable-length array of maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityLevelHolder {
    pub operations: Vec<BTreeMap<i32, bool>>,
}

impl PriorityLevelHolder {
    pub fn new(operations: Vec<BTreeMap<i32, bool>>) -> Self {
        Self { operations }
    }

    pub(crate) fn write_list(
        w: &mut ValueWriter,
        levels: &[PriorityLevelHolder],
    ) -> Result<(), ProtocolError> {
        w.write_array_len(levels.len())?;
        for level in levels {
            w.write_array_len(level.operations.len())?;
            for operation in &level.operations {
                w.write_map_int_bool(operation)?;
            }
        }
        Ok(())
    }

    pub(crate) fn read_list(
        r: &mut ValueReader<'_>,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Vec<PriorityLevelHolder>>, ProtocolError> {
        let Some(len) = r.read_array_header(field, owner)? else {
            return Ok(None);
        };
        let mut levels = Vec::with_capacity(len.min(1024) as usize);
        for _ in 0..len {
            let count = required(r.read_array_header(field, owner)?, field, owner)?;
            let mut operations = Vec::with_capacity(count.min(1024) as usize);
            for _ in 0..count {
                operations.push(required(r.read_map_int_bool(field, owner)?, field, owner)?);
            }
            levels.push(PriorityLevelHolder { operations });
        }
        Ok(Some(levels))
    }
}

/// Result of one event statement.
#[derive(Debug, Clone, PartialEq)]
pub struct EventResultHolder {
    pub status: AckStatus,
    pub notification: Option<String>,
    pub field_holders: Vec<FieldHolder>,
    pub sub_results: Vec<EventSubResultHolder>,
}

impl MessagePart for EventResultHolder {
    const NAME: &'static str = "EventResultHolder";
    const ELEMENTS: u32 = 4;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        self.status.write(w)?;
        w.write_opt_str(self.notification.as_deref())?;
        w.write_part_list(&self.field_holders)?;
        w.write_part_list(&self.sub_results)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = EventResultHolder::NAME;
        Ok(Self {
            status: required(AckStatus::read(r, "status", OWNER)?, "status", OWNER)?,
            notification: r.read_string("notification", OWNER)?,
            field_holders: required(
                r.read_part_list("fieldDescriptors", OWNER)?,
                "fieldDescriptors",
                OWNER,
            )?,
            sub_results: required(
                r.read_part_list("subResults", OWNER)?,
                "subResults",
                OWNER,
            )?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        for sub in &self.sub_results {
            if let Some(values) = &sub.values {
                if values.len() != self.field_holders.len() {
                    return Err(ProtocolError::invalid(
                        Self::NAME,
                        format!(
                            "sub result has {} values for {} field descriptors",
                            values.len(),
                            self.field_holders.len()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Per-record outcome of a data-manipulation statement.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSubResultHolder {
    pub sub_status: AckStatus,
    pub id: Option<String>,
    pub table_name: Option<String>,
    pub created: Option<bool>,
    pub version: Option<i64>,
    pub values: Option<Vec<Value>>,
}

impl EventSubResultHolder {
    pub fn new(sub_status: AckStatus) -> Self {
        Self {
            sub_status,
            id: None,
            table_name: None,
            created: None,
            version: None,
            values: None,
        }
    }
}

impl MessagePart for EventSubResultHolder {
    const NAME: &'static str = "EventSubResultHolder";
    const ELEMENTS: u32 = 6;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        self.sub_status.write(w)?;
        w.write_opt_str(self.id.as_deref())?;
        w.write_opt_str(self.table_name.as_deref())?;
        w.write_opt_bool(self.created)?;
        w.write_opt_int(self.version)?;
        w.write_opt(self.values.as_deref(), ValueWriter::write_value_list)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = EventSubResultHolder::NAME;
        Ok(Self {
            sub_status: required(AckStatus::read(r, "subStatus", OWNER)?, "subStatus", OWNER)?,
            id: r.read_string("id", OWNER)?,
            table_name: r.read_string("tableName", OWNER)?,
            created: r.read_bool("created", OWNER)?,
            version: r.read_long("version", OWNER)?,
            values: r.read_value_list("values", OWNER)?,
        })
    }
}

/// Per-row outcome of an event document insert.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDocumentResultHolder {
    pub status: AckStatus,
    pub notification: Option<String>,
    pub return_values: Option<BTreeMap<String, Value>>,
}

impl MessagePart for EventDocumentResultHolder {
    const NAME: &'static str = "EventDocumentResultHolder";
    const ELEMENTS: u32 = 3;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        self.status.write(w)?;
        w.write_opt_str(self.notification.as_deref())?;
        w.write_opt(self.return_values.as_ref(), ValueWriter::write_map_string_value)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = EventDocumentResultHolder::NAME;
        Ok(Self {
            status: required(AckStatus::read(r, "status", OWNER)?, "status", OWNER)?,
            notification: r.read_string("notification", OWNER)?,
            return_values: r.read_map_string_value("returnValues", OWNER)?,
        })
    }
}

/// An attachment and the metadata identifying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentResultHolder {
    pub request_ids: Vec<String>,
    pub owner_table: String,
    pub attachment_id: String,
    pub owner_ids: Option<Vec<String>>,
    pub meta: Option<String>,
    pub ttl: Option<i64>,
    pub to_valid: Option<i64>,
    pub attachment: Option<Bytes>,
}

impl AttachmentResultHolder {
    pub fn new(
        request_ids: Vec<String>,
        owner_table: impl Into<String>,
        attachment_id: impl Into<String>,
    ) -> Self {
        Self {
            request_ids,
            owner_table: owner_table.into(),
            attachment_id: attachment_id.into(),
            owner_ids: None,
            meta: None,
            ttl: None,
            to_valid: None,
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Bytes) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// The identifying part of this holder, as acknowledged back to the service.
    pub fn response_result(&self) -> AttachmentResponseResultHolder {
        AttachmentResponseResultHolder {
            request_ids: self.request_ids.clone(),
            owner_table: self.owner_table.clone(),
            attachment_id: self.attachment_id.clone(),
        }
    }
}

impl MessagePart for AttachmentResultHolder {
    const NAME: &'static str = "AttachmentResultHolder";
    const ELEMENTS: u32 = 8;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_string_list(&self.request_ids)?;
        w.write_str(&self.owner_table)?;
        w.write_str(&self.attachment_id)?;
        w.write_opt(self.owner_ids.as_deref(), ValueWriter::write_string_list)?;
        w.write_opt_str(self.meta.as_deref())?;
        w.write_opt_int(self.ttl)?;
        w.write_opt_int(self.to_valid)?;
        w.write_opt_bin(self.attachment.as_deref())
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = AttachmentResultHolder::NAME;
        Ok(Self {
            request_ids: required(
                r.read_string_list("requestIds", OWNER)?,
                "requestIds",
                OWNER,
            )?,
            owner_table: required(r.read_string("ownerTable", OWNER)?, "ownerTable", OWNER)?,
            attachment_id: required(
                r.read_string("attachmentId", OWNER)?,
                "attachmentId",
                OWNER,
            )?,
            owner_ids: r.read_string_list("ownerIds", OWNER)?,
            meta: r.read_string("meta", OWNER)?,
            ttl: r.read_long("ttl", OWNER)?,
            to_valid: r.read_long("toValid", OWNER)?,
            attachment: r.read_binary("attachment", OWNER)?,
        })
    }
}

/// Identifies a delivered attachment in an AttachmentResponseAck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentResponseResultHolder {
    pub request_ids: Vec<String>,
    pub owner_table: String,
    pub attachment_id: String,
}

impl MessagePart for AttachmentResponseResultHolder {
    const NAME: &'static str = "AttachmentResponseResultHolder";
    const ELEMENTS: u32 = 3;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_string_list(&self.request_ids)?;
        w.write_str(&self.owner_table)?;
        w.write_str(&self.attachment_id)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = AttachmentResponseResultHolder::NAME;
        Ok(Self {
            request_ids: required(
                r.read_string_list("requestIds", OWNER)?,
                "requestIds",
                OWNER,
            )?,
            owner_table: required(r.read_string("ownerTable", OWNER)?, "ownerTable", OWNER)?,
            attachment_id: required(
                r.read_string("attachmentId", OWNER)?,
                "attachmentId",
                OWNER,
            )?,
        })
    }
}

/// Identity of the service node that served a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdsHolder {
    pub cluster_name: String,
    pub gds_node_name: String,
}

impl MessagePart for GdsHolder {
    const NAME: &'static str = "GdsHolder";
    const ELEMENTS: u32 = 2;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_str(&self.cluster_name)?;
        w.write_str(&self.gds_node_name)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = GdsHolder::NAME;
        Ok(Self {
            cluster_name: required(r.read_string("clusterName", OWNER)?, "clusterName", OWNER)?,
            gds_node_name: required(
                r.read_string("gdsNodeName", OWNER)?,
                "gdsNodeName",
                OWNER,
            )?,
        })
    }
}

/// Continuation state of a paged query. Must be sent back unchanged to
/// fetch the next page.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryContextHolder {
    pub scroll_id: String,
    pub query: String,
    pub delivered_number_of_hits: i64,
    pub query_start_time: i64,
    pub consistency_type: ConsistencyType,
    pub last_bucket_id: Option<String>,
    pub gds_holder: GdsHolder,
    pub field_values: Vec<Value>,
    pub partition_names: Vec<String>,
}

impl MessagePart for QueryContextHolder {
    const NAME: &'static str = "QueryContextHolder";
    const ELEMENTS: u32 = 9;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_str(&self.scroll_id)?;
        w.write_str(&self.query)?;
        w.write_int(self.delivered_number_of_hits)?;
        w.write_int(self.query_start_time)?;
        w.write_str(self.consistency_type.as_str())?;
        w.write_opt_str(self.last_bucket_id.as_deref())?;
        w.write_part(&self.gds_holder)?;
        w.write_value_list(&self.field_values)?;
        w.write_string_list(&self.partition_names)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = QueryContextHolder::NAME;
        Ok(Self {
            scroll_id: required(r.read_string("scrollId", OWNER)?, "scrollId", OWNER)?,
            query: required(r.read_string("query", OWNER)?, "query", OWNER)?,
            delivered_number_of_hits: required(
                r.read_long("deliveredNumberOfHits", OWNER)?,
                "deliveredNumberOfHits",
                OWNER,
            )?,
            query_start_time: required(
                r.read_long("queryStartTime", OWNER)?,
                "queryStartTime",
                OWNER,
            )?,
            consistency_type: required(
                ConsistencyType::read(r, "consistencyType", OWNER)?,
                "consistencyType",
                OWNER,
            )?,
            last_bucket_id: r.read_string("lastBucketId", OWNER)?,
            gds_holder: required(r.read_part("gdsHolder", OWNER)?, "gdsHolder", OWNER)?,
            field_values: required(
                r.read_value_list("fieldValues", OWNER)?,
                "fieldValues",
                OWNER,
            )?,
            partition_names: required(
                r.read_string_list("partitionNames", OWNER)?,
                "partitionNames",
                OWNER,
            )?,
        })
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResultHolder {
    pub number_of_hits: i64,
    pub number_of_filtered_hits: i64,
    pub more_page: bool,
    pub query_context: QueryContextHolder,
    pub field_holders: Vec<FieldHolder>,
    pub hits: Vec<Vec<Value>>,
}

impl MessagePart for QueryResultHolder {
    const NAME: &'static str = "QueryResultHolder";
    const ELEMENTS: u32 = 6;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_int(self.number_of_hits)?;
        w.write_int(self.number_of_filtered_hits)?;
        w.write_bool(self.more_page)?;
        w.write_part(&self.query_context)?;
        w.write_part_list(&self.field_holders)?;
        w.write_value_matrix(&self.hits)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = QueryResultHolder::NAME;
        Ok(Self {
            number_of_hits: required(
                r.read_long("numberOfHits", OWNER)?,
                "numberOfHits",
                OWNER,
            )?,
            number_of_filtered_hits: required(
                r.read_long("numberOfFilteredHits", OWNER)?,
                "numberOfFilteredHits",
                OWNER,
            )?,
            more_page: required(r.read_bool("morePage", OWNER)?, "morePage", OWNER)?,
            query_context: required(
                r.read_part("queryContext", OWNER)?,
                "queryContext",
                OWNER,
            )?,
            field_holders: required(
                r.read_part_list("fieldDescriptors", OWNER)?,
                "fieldDescriptors",
                OWNER,
            )?,
            hits: required(r.read_value_matrix("hits", OWNER)?, "hits", OWNER)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.hits.len() as i64 > self.number_of_hits {
            return Err(ProtocolError::invalid(
                Self::NAME,
                format!(
                    "{} hit rows but numberOfHits is {}",
                    self.hits.len(),
                    self.number_of_hits
                ),
            ));
        }
        check_rows(Self::NAME, &self.field_holders, &self.hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> QueryContextHolder {
        QueryContextHolder {
            scroll_id: "scroll-1".to_string(),
            query: "SELECT * FROM multi_event".to_string(),
            delivered_number_of_hits: 2,
            query_start_time: 1_700_000_000_000,
            consistency_type: ConsistencyType::Pages,
            last_bucket_id: None,
            gds_holder: GdsHolder {
                cluster_name: "cluster".to_string(),
                gds_node_name: "node-1".to_string(),
            },
            field_values: vec![Value::from("ABC123"), Value::from(7)],
            partition_names: vec!["p0".to_string()],
        }
    }

    #[test]
    fn test_field_value_type_parse() {
        assert_eq!(FieldValueType::parse("KEYWORD").unwrap(), FieldValueType::Keyword);
        assert_eq!(
            FieldValueType::parse("BINARY_ARRAY").unwrap(),
            FieldValueType::BinaryArray
        );
        assert_eq!(FieldValueType::StringMap.to_string(), "STRING_MAP");
        assert!(matches!(
            FieldValueType::parse("keyword"),
            Err(ProtocolError::UnknownFieldType(_))
        ));
        assert!(matches!(
            ConsistencyType::parse("ALL"),
            Err(ProtocolError::UnknownConsistencyType(_))
        ));
    }

    #[test]
    fn test_field_holder_wire_layout() {
        let holder = FieldHolder::new("id", FieldValueType::Keyword, "");
        let bytes = holder.to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), b"\x93\xa2id\xa7KEYWORD\xa0");
        assert_eq!(FieldHolder::from_bytes(&bytes).unwrap(), holder);
    }

    #[test]
    fn test_unknown_field_type_is_decode_error() {
        let err = FieldHolder::from_bytes(b"\x93\xa2id\xa4WHAT\xa0").unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_query_context_roundtrip() {
        let context = sample_context();
        let bytes = context.to_bytes().unwrap();
        assert_eq!(QueryContextHolder::from_bytes(&bytes).unwrap(), context);
    }

    #[test]
    fn test_query_result_rows_must_match_descriptors() {
        let result = QueryResultHolder {
            number_of_hits: 1,
            number_of_filtered_hits: 0,
            more_page: false,
            query_context: sample_context(),
            field_holders: vec![
                FieldHolder::new("id", FieldValueType::Keyword, ""),
                FieldHolder::new("n", FieldValueType::Integer, ""),
            ],
            hits: vec![vec![Value::from("a")]],
        };
        assert!(result.to_bytes().unwrap_err().is_validation());
    }

    #[test]
    fn test_attachment_holder_roundtrip_with_nil_optionals() {
        let holder = AttachmentResultHolder::new(vec!["req-1".to_string()], "multi_event", "att-1");
        let bytes = holder.to_bytes().unwrap();
        let decoded = AttachmentResultHolder::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, holder);
        assert!(decoded.attachment.is_none());

        let full = AttachmentResultHolder {
            owner_ids: Some(vec!["evt-1".to_string()]),
            meta: Some("image/png".to_string()),
            ttl: Some(86_400_000),
            to_valid: Some(1_800_000_000_000),
            ..holder.with_attachment(Bytes::from_static(b"\x89PNG"))
        };
        let decoded = AttachmentResultHolder::from_bytes(&full.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, full);

        let ack = full.response_result();
        assert_eq!(ack.attachment_id, "att-1");
        assert_eq!(ack.owner_table, "multi_event");
        assert_eq!(ack.request_ids, vec!["req-1".to_string()]);
    }

    #[test]
    fn test_priority_levels_roundtrip() {
        let mut first = BTreeMap::new();
        first.insert(0, true);
        first.insert(1, false);
        let levels = vec![
            PriorityLevelHolder::new(vec![first]),
            PriorityLevelHolder::default(),
        ];

        let mut w = ValueWriter::new();
        PriorityLevelHolder::write_list(&mut w, &levels).unwrap();
        let bytes = w.into_bytes();

        let mut r = ValueReader::new(&bytes);
        let decoded = PriorityLevelHolder::read_list(&mut r, "priorityLevels", "Event").unwrap();
        assert_eq!(decoded, Some(levels));
        r.finish().unwrap();
    }

    #[test]
    fn test_event_result_sub_result_width() {
        let mut sub = EventSubResultHolder::new(AckStatus::Created);
        sub.id = Some("evt-1".to_string());
        sub.created = Some(true);
        sub.version = Some(1);
        sub.values = Some(vec![Value::from("evt-1")]);

        let result = EventResultHolder {
            status: AckStatus::Ok,
            notification: None,
            field_holders: vec![FieldHolder::new("id", FieldValueType::Keyword, "")],
            sub_results: vec![sub.clone()],
        };
        let decoded = EventResultHolder::from_bytes(&result.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, result);

        let wide = EventResultHolder {
            field_holders: vec![],
            ..result
        };
        assert!(wide.to_bytes().unwrap_err().is_validation());
    }
}
