//! Request event builders.

use std::net::SocketAddr;

use async_snmp_agent::handler::SecurityLevel;
use async_snmp_agent::pdu::Pdu;
use async_snmp_agent::transport::{RequestEvent, StateReference};
use async_snmp_agent::Version;

use super::fixtures::{COMMUNITY_RO, COMMUNITY_RW};

/// Address every test request comes from.
pub fn source() -> SocketAddr {
    "192.0.2.10:50000".parse().expect("valid address")
}

fn state(pdu: &Pdu) -> StateReference {
    StateReference(pdu.request_id as u64)
}

/// SNMPv1 request with the read-only community.
pub fn v1(pdu: Pdu) -> RequestEvent {
    let state = state(&pdu);
    RequestEvent::community(source(), Version::V1, COMMUNITY_RO, pdu, state)
}

/// SNMPv2c request with the read-only community.
pub fn v2c(pdu: Pdu) -> RequestEvent {
    let state = state(&pdu);
    RequestEvent::community(source(), Version::V2c, COMMUNITY_RO, pdu, state)
}

/// SNMPv2c request with the read-write community.
pub fn v2c_rw(pdu: Pdu) -> RequestEvent {
    let state = state(&pdu);
    RequestEvent::community(source(), Version::V2c, COMMUNITY_RW, pdu, state)
}

/// SNMPv3 authPriv request from `user` in `context`.
pub fn v3(user: &'static str, context: &'static str, pdu: Pdu) -> RequestEvent {
    let state = state(&pdu);
    RequestEvent::scoped(source(), user, SecurityLevel::AuthPriv, context, pdu, state)
}
