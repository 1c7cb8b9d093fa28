//! Paged queries.
//!
//! A [`QueryRequestData`] returns the first page in a [`QueryRequestAckData`].
//! While the page reports more results, the caller sends a
//! [`NextQueryPageData`] carrying the page's query context unchanged.

use super::ack::{AckData, AckResult, AckTypeData};
use crate::error::ProtocolError;
use crate::holders::{ConsistencyType, QueryContextHolder, QueryResultHolder};
use crate::part::{required, MessagePart};
use crate::value::{ValueReader, ValueWriter};

/// Default server-side time budget of a query, in milliseconds.
pub const DEFAULT_QUERY_TIMEOUT_MS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequestData {
    pub select_string: String,
    pub consistency_type: ConsistencyType,
    /// Milliseconds.
    pub timeout: i64,
    pub page_size: Option<i32>,
    pub query_type: Option<i32>,
}

impl QueryRequestData {
    pub fn new(select_string: impl Into<String>) -> Self {
        Self {
            select_string: select_string.into(),
            consistency_type: ConsistencyType::None,
            timeout: DEFAULT_QUERY_TIMEOUT_MS,
            page_size: None,
            query_type: None,
        }
    }

    pub fn with_consistency(mut self, consistency_type: ConsistencyType) -> Self {
        self.consistency_type = consistency_type;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: i64) -> Self {
        self.timeout = timeout_ms;
        self
    }

    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_query_type(mut self, query_type: i32) -> Self {
        self.query_type = Some(query_type);
        self
    }
}

impl MessagePart for QueryRequestData {
    const NAME: &'static str = "QueryRequest";
    const ELEMENTS: u32 = 5;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_str(&self.select_string)?;
        w.write_str(self.consistency_type.as_str())?;
        w.write_int(self.timeout)?;
        w.write_opt(self.page_size, |w, size| w.write_int(i64::from(size)))?;
        w.write_opt(self.query_type, |w, kind| w.write_int(i64::from(kind)))
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = QueryRequestData::NAME;
        Ok(Self {
            select_string: required(
                r.read_string("selectString", OWNER)?,
                "selectString",
                OWNER,
            )?,
            consistency_type: required(
                ConsistencyType::read(r, "consistencyType", OWNER)?,
                "consistencyType",
                OWNER,
            )?,
            timeout: required(r.read_long("timeout", OWNER)?, "timeout", OWNER)?,
            page_size: r.read_int("pageSize", OWNER)?,
            query_type: r.read_int("queryType", OWNER)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.select_string.trim().is_empty() {
            return Err(ProtocolError::invalid(Self::NAME, "empty selectString"));
        }
        if self.timeout < 0 {
            return Err(ProtocolError::invalid(Self::NAME, "negative timeout"));
        }
        if let Some(size) = self.page_size {
            if size <= 0 {
                return Err(ProtocolError::invalid(
                    Self::NAME,
                    format!("pageSize must be positive, got {size}"),
                ));
            }
        }
        Ok(())
    }
}

impl AckResult for QueryResultHolder {
    const TYPE_NAME: &'static str = "QueryRequestAckTypeData";
    const ACK_NAME: &'static str = "QueryRequestAck";
}

pub type QueryRequestAckTypeData = AckTypeData<QueryResultHolder>;

/// One page of a query's results.
pub type QueryRequestAckData = AckData<QueryRequestAckTypeData>;

impl QueryRequestAckData {
    pub fn result(&self) -> Option<&QueryResultHolder> {
        self.ack_data.as_ref().and_then(|body| body.result.as_ref())
    }

    /// Returns whether another page can be fetched with [`NextQueryPageData`].
    pub fn has_more_pages(&self) -> bool {
        self.global_status.is_success() && self.result().map_or(false, |result| result.more_page)
    }

    /// The continuation state to send back for the next page.
    pub fn query_context(&self) -> Option<&QueryContextHolder> {
        self.result().map(|result| &result.query_context)
    }
}

/// Request for the page following the one described by `query_context`.
#[derive(Debug, Clone, PartialEq)]
pub struct NextQueryPageData {
    pub query_context: QueryContextHolder,
    /// Milliseconds.
    pub timeout: i64,
}

impl NextQueryPageData {
    pub fn new(query_context: QueryContextHolder, timeout_ms: i64) -> Self {
        Self {
            query_context,
            timeout: timeout_ms,
        }
    }
}

impl MessagePart for NextQueryPageData {
    const NAME: &'static str = "NextQueryPage";
    const ELEMENTS: u32 = 2;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_part(&self.query_context)?;
        w.write_int(self.timeout)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = NextQueryPageData::NAME;
        Ok(Self {
            query_context: required(
                r.read_part("queryContext", OWNER)?,
                "queryContext",
                OWNER,
            )?,
            timeout: required(r.read_long("timeout", OWNER)?, "timeout", OWNER)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.timeout < 0 {
            return Err(ProtocolError::invalid(Self::NAME, "negative timeout"));
        }
        Ok(())
    }
}
