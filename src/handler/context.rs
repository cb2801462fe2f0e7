//! Request context for managed objects.
//!
//! This module provides [`RequestContext`], the addressing and security
//! metadata of the request being processed, after admission resolved its
//! context.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::pdu::PduType;
use crate::version::Version;

/// Security model identifiers (RFC 3411).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SecurityModel {
    /// Wildcard for VACM matching (matches any model).
    Any = 0,
    /// SNMPv1.
    V1 = 1,
    /// SNMPv2c.
    V2c = 2,
    /// SNMPv3 User-based Security Model.
    Usm = 3,
}

impl SecurityModel {
    /// The security model a community-based version implies.
    pub fn for_version(version: Version) -> Self {
        match version {
            Version::V1 => Self::V1,
            Version::V2c => Self::V2c,
            Version::V3 => Self::Usm,
        }
    }
}

/// SNMPv3 security level, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SecurityLevel {
    /// No authentication, no privacy
    #[default]
    NoAuthNoPriv,
    /// Authentication only
    AuthNoPriv,
    /// Authentication and privacy (encryption)
    AuthPriv,
}

/// Request context passed to managed objects.
///
/// # Example
///
/// ```rust
/// use async_snmp_agent::handler::RequestContext;
///
/// let ctx = RequestContext::test_context();
/// assert!(ctx.context_name.is_empty());
/// assert_eq!(&ctx.security_name[..], b"public");
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Source address of the request.
    pub source: SocketAddr,

    /// SNMP version (V1, V2c, or V3).
    pub version: Version,

    /// Security model used for this request.
    pub security_model: SecurityModel,

    /// Security name.
    ///
    /// For v1/v2c this is the name the community mapped to, not the
    /// community itself.
    pub security_name: Bytes,

    /// Security level (NoAuthNoPriv for v1/v2c).
    pub security_level: SecurityLevel,

    /// Resolved context name. Empty is the default context.
    pub context_name: Bytes,

    /// Request ID from the PDU.
    pub request_id: i32,

    /// PDU type (GetRequest, GetNextRequest, SetRequest, etc.).
    pub pdu_type: PduType,
}

impl RequestContext {
    /// Create a minimal context for unit testing.
    pub fn test_context() -> Self {
        use std::net::{IpAddr, Ipv4Addr, SocketAddr};

        Self {
            source: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            version: Version::V2c,
            security_model: SecurityModel::V2c,
            security_name: Bytes::from_static(b"public"),
            security_level: SecurityLevel::NoAuthNoPriv,
            context_name: Bytes::new(),
            request_id: 1,
            pdu_type: PduType::GetRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_level_order() {
        assert!(SecurityLevel::AuthPriv > SecurityLevel::AuthNoPriv);
        assert!(SecurityLevel::AuthNoPriv > SecurityLevel::NoAuthNoPriv);
    }

    #[test]
    fn test_model_for_version() {
        assert_eq!(SecurityModel::for_version(Version::V1), SecurityModel::V1);
        assert_eq!(SecurityModel::for_version(Version::V3), SecurityModel::Usm);
    }
}
