//! The envelope shared by every ack payload.
//!
//! ```text
//! globalStatus, ackData?, globalException?
//! ```
//!
//! Typed bodies (attachment and query acks) nest a second envelope of the
//! same shape: `status, result?, remoteException?`.

use crate::error::ProtocolError;
use crate::part::{required, MessagePart};
use crate::status::AckStatus;
use crate::value::{ValueReader, ValueWriter};

/// The `ackData` element of an ack payload.
pub trait AckBody: Sized {
    /// Name of the ack variant carrying this body.
    const ACK_NAME: &'static str;

    fn write_body(&self, w: &mut ValueWriter) -> Result<(), ProtocolError>;

    fn read_body(
        r: &mut ValueReader<'_>,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Self>, ProtocolError>;

    /// Returns whether the body is the kind of payload a successful ack carries.
    fn is_success_shaped(&self) -> bool {
        true
    }
}

/// An ack payload: a global status, the body when the request succeeded,
/// and the service's error text when it did not.
#[derive(Debug, Clone, PartialEq)]
pub struct AckData<B> {
    pub global_status: AckStatus,
    pub ack_data: Option<B>,
    pub global_exception: Option<String>,
}

impl<B> AckData<B> {
    pub fn new(global_status: AckStatus, ack_data: B) -> Self {
        Self {
            global_status,
            ack_data: Some(ack_data),
            global_exception: None,
        }
    }

    /// An ack reporting failure, with no body.
    pub fn failure(global_status: AckStatus, exception: impl Into<String>) -> Self {
        Self {
            global_status,
            ack_data: None,
            global_exception: Some(exception.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.global_status.is_success()
    }
}

impl<B: AckBody> MessagePart for AckData<B> {
    const NAME: &'static str = B::ACK_NAME;
    const ELEMENTS: u32 = 3;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        self.global_status.write(w)?;
        w.write_opt(self.ack_data.as_ref(), |w, body| body.write_body(w))?;
        w.write_opt_str(self.global_exception.as_deref())
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        let owner = B::ACK_NAME;
        Ok(Self {
            global_status: required(
                AckStatus::read(r, "globalStatus", owner)?,
                "globalStatus",
                owner,
            )?,
            ack_data: B::read_body(r, "ackData", owner)?,
            global_exception: r.read_string("globalException", owner)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        match (&self.ack_data, self.global_status.is_success()) {
            (None, true) => Err(ProtocolError::MissingField {
                field: "ackData",
                owner: Self::NAME,
            }),
            (Some(body), false) if body.is_success_shaped() => Err(ProtocolError::invalid(
                Self::NAME,
                format!("ackData present with status {}", self.global_status),
            )),
            (Some(body), true) if !body.is_success_shaped() => Err(ProtocolError::invalid(
                Self::NAME,
                format!("rejection data present with status {}", self.global_status),
            )),
            _ => Ok(()),
        }
    }
}

/// The result record nested in a typed ack body.
pub trait AckResult: MessagePart {
    /// Name of the typed body record.
    const TYPE_NAME: &'static str;
    /// Name of the ack variant carrying the body.
    const ACK_NAME: &'static str;
    /// Whether a successful body must carry a result.
    const RESULT_REQUIRED: bool = true;
}

/// A typed ack body: the per-request status, its result and the remote
/// exception text.
#[derive(Debug, Clone, PartialEq)]
pub struct AckTypeData<R> {
    pub status: AckStatus,
    pub result: Option<R>,
    pub remote_exception: Option<String>,
}

impl<R> AckTypeData<R> {
    pub fn new(status: AckStatus, result: Option<R>) -> Self {
        Self {
            status,
            result,
            remote_exception: None,
        }
    }

    pub fn with_remote_exception(mut self, exception: impl Into<String>) -> Self {
        self.remote_exception = Some(exception.into());
        self
    }
}

impl<R: AckResult> MessagePart for AckTypeData<R> {
    const NAME: &'static str = R::TYPE_NAME;
    const ELEMENTS: u32 = 3;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        self.status.write(w)?;
        w.write_opt_part(self.result.as_ref())?;
        w.write_opt_str(self.remote_exception.as_deref())
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        let owner = R::TYPE_NAME;
        Ok(Self {
            status: required(AckStatus::read(r, "status", owner)?, "status", owner)?,
            result: r.read_part("result", owner)?,
            remote_exception: r.read_string("remoteException", owner)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if R::RESULT_REQUIRED && self.status.is_success() && self.result.is_none() {
            return Err(ProtocolError::MissingField {
                field: "result",
                owner: Self::NAME,
            });
        }
        Ok(())
    }
}

impl<R: AckResult> AckBody for AckTypeData<R> {
    const ACK_NAME: &'static str = R::ACK_NAME;

    fn write_body(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_part(self)
    }

    fn read_body(
        r: &mut ValueReader<'_>,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Self>, ProtocolError> {
        r.read_part(field, owner)
    }
}
