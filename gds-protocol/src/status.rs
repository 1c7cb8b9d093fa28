//! Ack status codes carried by every response payload.

use crate::error::ProtocolError;
use crate::value::{ValueReader, ValueWriter};
use std::fmt;

/// Status codes used by the service in global and per-item acks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckStatus {
    Ok,
    Created,
    Accepted,
    NotModified,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    NotAcceptable,
    RequestTimeout,
    Conflict,
    PreconditionFailed,
    PayloadTooLarge,
    InternalServerError,
    NotImplemented,
    ServiceUnavailable,
}

impl AckStatus {
    pub fn code(&self) -> i32 {
        match self {
            AckStatus::Ok => 200,
            AckStatus::Created => 201,
            AckStatus::Accepted => 202,
            AckStatus::NotModified => 304,
            AckStatus::BadRequest => 400,
            AckStatus::Unauthorized => 401,
            AckStatus::Forbidden => 403,
            AckStatus::NotFound => 404,
            AckStatus::NotAcceptable => 406,
            AckStatus::RequestTimeout => 408,
            AckStatus::Conflict => 409,
            AckStatus::PreconditionFailed => 412,
            AckStatus::PayloadTooLarge => 413,
            AckStatus::InternalServerError => 500,
            AckStatus::NotImplemented => 501,
            AckStatus::ServiceUnavailable => 503,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, ProtocolError> {
        let status = match code {
            200 => AckStatus::Ok,
            201 => AckStatus::Created,
            202 => AckStatus::Accepted,
            304 => AckStatus::NotModified,
            400 => AckStatus::BadRequest,
            401 => AckStatus::Unauthorized,
            403 => AckStatus::Forbidden,
            404 => AckStatus::NotFound,
            406 => AckStatus::NotAcceptable,
            408 => AckStatus::RequestTimeout,
            409 => AckStatus::Conflict,
            412 => AckStatus::PreconditionFailed,
            413 => AckStatus::PayloadTooLarge,
            500 => AckStatus::InternalServerError,
            501 => AckStatus::NotImplemented,
            503 => AckStatus::ServiceUnavailable,
            other => return Err(ProtocolError::UnknownAckStatus(other)),
        };
        Ok(status)
    }

    /// Returns whether the status means the request was carried out and a
    /// result payload follows.
    pub fn is_success(&self) -> bool {
        matches!(self, AckStatus::Ok | AckStatus::Created | AckStatus::Accepted)
    }

    pub(crate) fn write(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_int(i64::from(self.code()))
    }

    pub(crate) fn read(
        r: &mut ValueReader<'_>,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Self>, ProtocolError> {
        r.read_long(field, owner)?.map(Self::from_code).transpose()
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AckStatus::Ok => "OK",
            AckStatus::Created => "CREATED",
            AckStatus::Accepted => "ACCEPTED",
            AckStatus::NotModified => "NOT_MODIFIED",
            AckStatus::BadRequest => "BAD_REQUEST",
            AckStatus::Unauthorized => "UNAUTHORIZED",
            AckStatus::Forbidden => "FORBIDDEN",
            AckStatus::NotFound => "NOT_FOUND",
            AckStatus::NotAcceptable => "NOT_ACCEPTABLE",
            AckStatus::RequestTimeout => "REQUEST_TIMEOUT",
            AckStatus::Conflict => "CONFLICT",
            AckStatus::PreconditionFailed => "PRECONDITION_FAILED",
            AckStatus::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            AckStatus::InternalServerError => "INTERNAL_SERVER_ERROR",
            AckStatus::NotImplemented => "NOT_IMPLEMENTED",
            AckStatus::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_roundtrip() {
        for status in [
            AckStatus::Ok,
            AckStatus::Created,
            AckStatus::Accepted,
            AckStatus::NotModified,
            AckStatus::BadRequest,
            AckStatus::Unauthorized,
            AckStatus::Forbidden,
            AckStatus::NotFound,
            AckStatus::NotAcceptable,
            AckStatus::RequestTimeout,
            AckStatus::Conflict,
            AckStatus::PreconditionFailed,
            AckStatus::PayloadTooLarge,
            AckStatus::InternalServerError,
            AckStatus::NotImplemented,
            AckStatus::ServiceUnavailable,
        ] {
            assert_eq!(
                AckStatus::from_code(i64::from(status.code())).unwrap(),
                status
            );
        }
    }

    #[test]
    fn test_unknown_status_code() {
        assert!(matches!(
            AckStatus::from_code(299),
            Err(ProtocolError::UnknownAckStatus(299))
        ));
    }

    #[test]
    fn test_success_statuses() {
        assert!(AckStatus::Ok.is_success());
        assert!(AckStatus::Created.is_success());
        assert!(AckStatus::Accepted.is_success());
        assert!(!AckStatus::NotModified.is_success());
        assert!(!AckStatus::Unauthorized.is_success());
        assert!(!AckStatus::InternalServerError.is_success());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(AckStatus::Ok.to_string(), "OK (200)");
        assert_eq!(AckStatus::Unauthorized.to_string(), "UNAUTHORIZED (401)");
    }
}
