//! Login handshake payloads.

use super::ack::{AckBody, AckData};
use crate::error::ProtocolError;
use crate::part::{required, MessagePart};
use crate::value::{ValueReader, ValueType, ValueWriter};
use std::collections::BTreeMap;

/// Login request sent right after the transport opens.
///
/// The password travels as the first reserved field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionData {
    pub cluster_name: String,
    pub serve_on_the_same_connection: bool,
    pub protocol_version_number: i32,
    pub fragmentation_supported: bool,
    pub fragment_transmission_unit: Option<i64>,
    pub reserved_fields: Option<Vec<String>>,
}

impl ConnectionData {
    pub fn new(cluster_name: impl Into<String>, protocol_version_number: i32) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            serve_on_the_same_connection: true,
            protocol_version_number,
            fragmentation_supported: false,
            fragment_transmission_unit: None,
            reserved_fields: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let mut reserved = self.reserved_fields.take().unwrap_or_default();
        if reserved.is_empty() {
            reserved.push(password.into());
        } else {
            reserved[0] = password.into();
        }
        self.reserved_fields = Some(reserved);
        self
    }

    pub fn with_fragmentation(mut self, transmission_unit: i64) -> Self {
        self.fragmentation_supported = true;
        self.fragment_transmission_unit = Some(transmission_unit);
        self
    }

    pub fn with_serve_on_the_same_connection(mut self, same: bool) -> Self {
        self.serve_on_the_same_connection = same;
        self
    }

    pub fn password(&self) -> Option<&str> {
        self.reserved_fields
            .as_ref()
            .and_then(|fields| fields.first())
            .map(String::as_str)
    }
}

impl MessagePart for ConnectionData {
    const NAME: &'static str = "Connection";
    const ELEMENTS: u32 = 6;

    fn pack_fields(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        w.write_str(&self.cluster_name)?;
        w.write_bool(self.serve_on_the_same_connection)?;
        w.write_int(i64::from(self.protocol_version_number))?;
        w.write_bool(self.fragmentation_supported)?;
        w.write_opt_int(self.fragment_transmission_unit)?;
        w.write_opt(self.reserved_fields.as_deref(), ValueWriter::write_string_list)
    }

    fn unpack_fields(r: &mut ValueReader<'_>) -> Result<Self, ProtocolError> {
        const OWNER: &str = ConnectionData::NAME;
        Ok(Self {
            cluster_name: required(r.read_string("clusterName", OWNER)?, "clusterName", OWNER)?,
            serve_on_the_same_connection: required(
                r.read_bool("serveOnTheSameConnection", OWNER)?,
                "serveOnTheSameConnection",
                OWNER,
            )?,
            protocol_version_number: required(
                r.read_int("protocolVersionNumber", OWNER)?,
                "protocolVersionNumber",
                OWNER,
            )?,
            fragmentation_supported: required(
                r.read_bool("fragmentationSupported", OWNER)?,
                "fragmentationSupported",
                OWNER,
            )?,
            fragment_transmission_unit: r.read_long("fragmentTransmissionUnit", OWNER)?,
            reserved_fields: r.read_string_list("reservedFields", OWNER)?,
        })
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        match (self.fragmentation_supported, self.fragment_transmission_unit) {
            (true, Some(unit)) if unit > 0 => Ok(()),
            (true, _) => Err(ProtocolError::invalid(
                Self::NAME,
                "fragmentation supported without a positive fragmentTransmissionUnit",
            )),
            (false, Some(_)) => Err(ProtocolError::invalid(
                Self::NAME,
                "fragmentTransmissionUnit set while fragmentation is not supported",
            )),
            (false, None) => Ok(()),
        }
    }
}

/// Body of a login ack: the accepted login parameters echoed back, or the
/// rejected items keyed by their position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAckTypeData {
    Accepted(ConnectionData),
    Rejected(BTreeMap<i32, String>),
}

impl AckBody for ConnectionAckTypeData {
    const ACK_NAME: &'static str = "ConnectionAck";

    fn write_body(&self, w: &mut ValueWriter) -> Result<(), ProtocolError> {
        match self {
            ConnectionAckTypeData::Accepted(connection) => w.write_part(connection),
            ConnectionAckTypeData::Rejected(reasons) => w.write_map_int_string(reasons),
        }
    }

    fn read_body(
        r: &mut ValueReader<'_>,
        field: &'static str,
        owner: &'static str,
    ) -> Result<Option<Self>, ProtocolError> {
        if r.peek_type()? == ValueType::Map {
            return Ok(r
                .read_map_int_string(field, owner)?
                .map(ConnectionAckTypeData::Rejected));
        }
        Ok(r
            .read_part(field, owner)?
            .map(ConnectionAckTypeData::Accepted))
    }

    fn is_success_shaped(&self) -> bool {
        matches!(self, ConnectionAckTypeData::Accepted(_))
    }
}

/// Login ack.
pub type ConnectionAckData = AckData<ConnectionAckTypeData>;

impl ConnectionAckData {
    pub fn accepted(connection: ConnectionData) -> Self {
        Self::new(
            crate::status::AckStatus::Ok,
            ConnectionAckTypeData::Accepted(connection),
        )
    }

    /// A rejected login, with the reasons keyed by the rejected item.
    pub fn rejected(
        status: crate::status::AckStatus,
        reasons: BTreeMap<i32, String>,
        exception: impl Into<String>,
    ) -> Self {
        Self {
            global_status: status,
            ack_data: Some(ConnectionAckTypeData::Rejected(reasons)),
            global_exception: Some(exception.into()),
        }
    }

    pub fn rejection_reasons(&self) -> Option<&BTreeMap<i32, String>> {
        match &self.ack_data {
            Some(ConnectionAckTypeData::Rejected(reasons)) => Some(reasons),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::AckStatus;

    #[test]
    fn test_connection_wire_layout() {
        let data = ConnectionData::new("cluster", 6).with_password("secret");
        let bytes = data.to_bytes().unwrap();
        let expected: &[u8] = b"\x96\xa7cluster\xc3\x06\xc2\xc0\x91\xa6secret";
        assert_eq!(bytes.as_ref(), expected);
        let decoded = ConnectionData::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.password(), Some("secret"));
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_connection_fragmentation_requires_unit() {
        let data = ConnectionData::new("cluster", 6).with_fragmentation(0);
        assert!(data.to_bytes().unwrap_err().is_validation());

        let data = ConnectionData {
            fragment_transmission_unit: Some(1024),
            ..ConnectionData::new("cluster", 6)
        };
        assert!(data.to_bytes().unwrap_err().is_validation());

        let data = ConnectionData::new("cluster", 6).with_fragmentation(1024);
        assert_eq!(ConnectionData::from_bytes(&data.to_bytes().unwrap()).unwrap(), data);
    }

    #[test]
    fn test_password_replaces_first_reserved_field() {
        let data = ConnectionData::new("cluster", 6)
            .with_password("first")
            .with_password("second");
        assert_eq!(data.reserved_fields, Some(vec!["second".to_string()]));
    }

    #[test]
    fn test_accepted_ack_roundtrip() {
        let ack = ConnectionAckData::accepted(ConnectionData::new("cluster", 6));
        let decoded = ConnectionAckData::from_bytes(&ack.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, ack);
        assert!(decoded.rejection_reasons().is_none());
    }

    #[test]
    fn test_rejected_ack_roundtrip() {
        let mut reasons = BTreeMap::new();
        reasons.insert(0, "wrong password".to_string());
        let ack = ConnectionAckData::rejected(AckStatus::Unauthorized, reasons.clone(), "denied");
        let decoded = ConnectionAckData::from_bytes(&ack.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.rejection_reasons(), Some(&reasons));
        assert_eq!(decoded.global_exception.as_deref(), Some("denied"));
    }

    #[test]
    fn test_ok_ack_with_rejection_map_is_invalid() {
        let ack = ConnectionAckData {
            global_status: AckStatus::Ok,
            ack_data: Some(ConnectionAckTypeData::Rejected(BTreeMap::new())),
            global_exception: None,
        };
        assert!(ack.to_bytes().unwrap_err().is_validation());
    }

    #[test]
    fn test_unauthorized_ack_with_echoed_login_is_invalid() {
        let ack = ConnectionAckData {
            global_status: AckStatus::Unauthorized,
            ack_data: Some(ConnectionAckTypeData::Accepted(ConnectionData::new("c", 6))),
            global_exception: None,
        };
        assert!(ack.to_bytes().unwrap_err().is_validation());
    }
}
