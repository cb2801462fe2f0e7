//! SNMP Protocol Data Units (PDUs).
//!
//! PDUs arrive already decoded by the transport collaborator; this module
//! only models their shape and estimates their encoded size.

use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::util::{integer_content_len, tlv_len};
use crate::varbind::{VarBind, varbind_list_size};

/// PDU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    /// Confirmed-class PDUs expect a response (RFC 3411 Section 2.8).
    pub fn is_confirmed(self) -> bool {
        matches!(
            self,
            Self::GetRequest
                | Self::GetNextRequest
                | Self::GetBulkRequest
                | Self::SetRequest
                | Self::InformRequest
        )
    }

    /// Operation class used to pick a proxy forwarder.
    pub fn operation_class(self) -> OperationClass {
        match self {
            Self::GetRequest | Self::GetNextRequest | Self::GetBulkRequest => OperationClass::Read,
            Self::SetRequest => OperationClass::Write,
            Self::InformRequest => OperationClass::Inform,
            Self::TrapV1 | Self::TrapV2 | Self::Response | Self::Report => OperationClass::Notify,
        }
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GetRequest => write!(f, "GetRequest"),
            Self::GetNextRequest => write!(f, "GetNextRequest"),
            Self::Response => write!(f, "Response"),
            Self::SetRequest => write!(f, "SetRequest"),
            Self::TrapV1 => write!(f, "TrapV1"),
            Self::GetBulkRequest => write!(f, "GetBulkRequest"),
            Self::InformRequest => write!(f, "InformRequest"),
            Self::TrapV2 => write!(f, "TrapV2"),
            Self::Report => write!(f, "Report"),
        }
    }
}

/// Proxy forwarding classes (RFC 3413 Section 3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperationClass {
    Read,
    Write,
    Notify,
    Inform,
}

/// Generic PDU structure for request/response operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    /// PDU type
    pub pdu_type: PduType,
    /// Request ID for correlating requests and responses
    pub request_id: i32,
    /// Error status (0 for requests, error code for responses).
    /// Holds non-repeaters for GETBULK.
    pub error_status: i32,
    /// Error index (1-based index of problematic varbind).
    /// Holds max-repetitions for GETBULK.
    pub error_index: i32,
    /// Variable bindings
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create a new GET request PDU.
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetRequest, request_id, oids)
    }

    /// Create a new GETNEXT request PDU.
    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetNextRequest, request_id, oids)
    }

    /// Create a new SET request PDU.
    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::SetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Create a GETBULK request PDU.
    pub fn get_bulk(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    fn request(pdu_type: PduType, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// GETBULK non-repeaters, clamped to the varbind count.
    pub fn non_repeaters(&self) -> usize {
        (self.error_status.max(0) as usize).min(self.varbinds.len())
    }

    /// GETBULK max-repetitions (negative values read as zero).
    pub fn max_repetitions(&self) -> usize {
        self.error_index.max(0) as usize
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    /// Get the error status as an enum.
    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// Response PDU carrying `varbinds` and no error.
    pub fn to_response(&self, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Response PDU with an error status, echoing the request varbinds.
    pub fn to_error_response(&self, error_status: ErrorStatus, error_index: i32) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: error_status.as_i32(),
            error_index,
            varbinds: self.varbinds.clone(),
        }
    }

    /// Encoded size of the PDU (tag, header integers and varbind list).
    pub fn encoded_size(&self) -> usize {
        let content = tlv_len(integer_content_len(self.request_id))
            + tlv_len(integer_content_len(self.error_status))
            + tlv_len(integer_content_len(self.error_index))
            + varbind_list_size(&self.varbinds);
        tlv_len(content)
    }
}
