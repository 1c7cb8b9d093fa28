//! Two-phase attachment retrieval.
//!
//! The client sends an [`AttachmentRequestData`]. The service answers with an
//! [`AttachmentRequestAckData`] that either carries the attachment bytes or
//! announces them as pending; pending attachments arrive later in an
//! [`AttachmentResponseData`] with the same message id, which the client
//! acknowledges with an [`AttachmentResponseAckData`].

use super::ack::{AckData, AckResult, AckTypeData};
use crate::error::ProtocolError;
use crate::holders::{AttachmentResponseResultHolder, AttachmentResultHolder};
use crate::part::{required, MessagePart};
use crate::status::AckStatus;
use crate::value::{ValueReader, ValueWriter};
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRequestData {
    /// The select statement identifying the attachment.
    pub request: String,
}

impl AttachmentRequestData {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
        }
    }
}

impl MessagePart for AttachmentRequestData {
    const NAME: &'static str = "AttachmentRequest";
    const ELEMENTS: u32 = 1;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_str(&self.request)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = AttachmentRequestData::NAME;
        Ok(Self {
            request: required(r.read_string("request", OWNER)?, "request", OWNER)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.request.trim().is_empty() {
            return Err(ProtocolError::invalid(Self::NAME, "empty request"));
        }
        Ok(())
    }
}

impl AckResult for AttachmentResultHolder {
    const TYPE_NAME: &'static str = "AttachmentRequestAckTypeData";
    const ACK_NAME: &'static str = "AttachmentRequestAck";
    // A successful ack without a result means the attachment follows later.
    const RESULT_REQUIRED: bool = false;
}

pub type AttachmentRequestAckTypeData = AckTypeData<AttachmentResultHolder>;

pub type AttachmentRequestAckData = AckData<AttachmentRequestAckTypeData>;

impl AttachmentRequestAckData {
    /// Returns whether the service accepted the request but has not sent the
    /// attachment bytes yet.
    pub fn attachment_pending(&self) -> bool {
        if !self.global_status.is_success() {
            return false;
        }
        match &self.ack_data {
            Some(body) if body.status.is_success() => body
                .result
                .as_ref()
                .map_or(true, |result| result.attachment.is_none()),
            _ => false,
        }
    }

    pub fn result(&self) -> Option<&AttachmentResultHolder> {
        self.ack_data.as_ref().and_then(|body| body.result.as_ref())
    }

    pub fn attachment(&self) -> Option<&Bytes> {
        self.result().and_then(|result| result.attachment.as_ref())
    }
}

/// An attachment delivered after a pending [`AttachmentRequestAckData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentResponseData {
    pub result: AttachmentResultHolder,
}

impl AttachmentResponseData {
    pub fn new(result: AttachmentResultHolder) -> Self {
        Self { result }
    }

    /// Builds the ack the client owes the service for this delivery.
    pub fn ack(&self) -> AttachmentResponseAckData {
        AckData::new(
            AckStatus::Ok,
            AckTypeData::new(AckStatus::Ok, Some(self.result.response_result())),
        )
    }
}

impl MessagePart for AttachmentResponseData {
    const NAME: &'static str = "AttachmentResponse";
    const ELEMENTS: u32 = 1;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_part(&self.result)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = AttachmentResponseData::NAME;
        Ok(Self {
            result: required(r.read_part("result", OWNER)?, "result", OWNER)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.result.attachment.is_none() {
            return Err(ProtocolError::MissingField {
                field: "attachment",
                owner: Self::NAME,
            });
        }
        Ok(())
    }
}

impl AckResult for AttachmentResponseResultHolder {
    const TYPE_NAME: &'static str = "AttachmentResponseAckTypeData";
    const ACK_NAME: &'static str = "AttachmentResponseAck";
}

pub type AttachmentResponseAckTypeData = AckTypeData<AttachmentResponseResultHolder>;

pub type AttachmentResponseAckData = AckData<AttachmentResponseAckTypeData>;

#[cfg(test)]
mod tests {
    use super::*;

    fn holder() -> AttachmentResultHolder {
        AttachmentResultHolder::new(vec!["req-1".to_string()], "multi_event", "att-1")
    }

    #[test]
    fn test_request_roundtrip() {
        let request = AttachmentRequestData::new(
            "SELECT * FROM multi_event_@attachment WHERE id='att-1' FOR UPDATE WAIT 86400",
        );
        let bytes = request.to_bytes().unwrap();
        assert_eq!(bytes[0], 0x91);
        assert_eq!(AttachmentRequestData::from_bytes(&bytes).unwrap(), request);
        assert!(AttachmentRequestData::new("  ").to_bytes().is_err());
    }

    #[test]
    fn test_ack_with_attachment_is_complete() {
        let ack = AttachmentRequestAckData::new(
            AckStatus::Ok,
            AckTypeData::new(
                AckStatus::Ok,
                Some(holder().with_attachment(Bytes::from_static(b"data"))),
            ),
        );
        let decoded = AttachmentRequestAckData::from_bytes(&ack.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, ack);
        assert!(!decoded.attachment_pending());
        assert_eq!(decoded.attachment().map(|b| b.as_ref()), Some(&b"data"[..]));
    }

    #[test]
    fn test_ack_without_result_is_pending() {
        let ack = AttachmentRequestAckData::new(AckStatus::Ok, AckTypeData::new(AckStatus::Created, None));
        let decoded = AttachmentRequestAckData::from_bytes(&ack.to_bytes().unwrap()).unwrap();
        assert!(decoded.attachment_pending());
        assert!(decoded.result().is_none());

        let ack =
            AttachmentRequestAckData::new(AckStatus::Ok, AckTypeData::new(AckStatus::Ok, Some(holder())));
        assert!(ack.attachment_pending());
    }

    #[test]
    fn test_failed_ack_is_not_pending() {
        let ack = AttachmentRequestAckData::failure(AckStatus::NotFound, "no such attachment");
        assert!(!ack.attachment_pending());

        let ack = AttachmentRequestAckData::new(
            AckStatus::Ok,
            AckTypeData::new(AckStatus::NotFound, None).with_remote_exception("missing"),
        );
        assert!(!ack.attachment_pending());
    }

    #[test]
    fn test_response_requires_attachment() {
        let response = AttachmentResponseData::new(holder());
        assert!(matches!(
            response.to_bytes(),
            Err(ProtocolError::MissingField {
                field: "attachment",
                ..
            })
        ));
    }

    #[test]
    fn test_response_ack_references_attachment() {
        let response =
            AttachmentResponseData::new(holder().with_attachment(Bytes::from_static(b"png")));
        let decoded = AttachmentResponseData::from_bytes(&response.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, response);

        let ack = decoded.ack();
        let bytes = ack.to_bytes().unwrap();
        let ack = AttachmentResponseAckData::from_bytes(&bytes).unwrap();
        let result = ack.ack_data.and_then(|body| body.result).unwrap();
        assert_eq!(result.attachment_id, "att-1");
        assert_eq!(result.owner_table, "multi_event");
    }
}
