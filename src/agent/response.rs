//! Response assembly and size enforcement.

use std::sync::atomic::Ordering;

use bytes::Bytes;

use crate::error::ErrorStatus;
use crate::handler::SubRequest;
use crate::pdu::{Pdu, PduType};
use crate::transport::{RequestEvent, ResponseEvent};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::{Agent, snmp_unknown_pdu_handlers_oid};

/// Overhead for SNMP message encoding (approximate conservative estimate).
/// This accounts for version, security parameters, message header, etc.
/// Names carried in the message (community or user, context) come on top.
pub(super) const RESPONSE_OVERHEAD: usize = 100;

/// Growth of the PDU and varbind-list length fields once their content
/// passes 255 octets.
const LENGTH_FIELD_GROWTH: usize = 4;

/// Build the response PDU from processed sub-requests.
///
/// The first sub-request carrying an error decides the error-status and
/// error-index, and the request's varbinds are echoed. SNMPv1 has no
/// exception values: a GET or GETNEXT that produced one is answered with
/// `noSuchName`, and v2 statuses are mapped onto the v1 set.
pub(super) fn assemble(version: Version, request: &Pdu, subs: Vec<SubRequest>) -> Pdu {
    if let Some(failed) = subs.iter().find(|s| s.has_error()) {
        let status = match version {
            Version::V1 => failed.status().to_v1(),
            _ => failed.status(),
        };
        return request.to_error_response(status, failed.error_index() as i32);
    }

    if version == Version::V1
        && let Some(exception) = subs.iter().find(|s| s.value().is_exception())
    {
        return request.to_error_response(ErrorStatus::NoSuchName, exception.index() as i32 + 1);
    }

    request.to_response(subs.into_iter().map(SubRequest::into_varbind).collect())
}

/// Octets handlers may spend on response varbinds within `limit`.
pub(super) fn varbind_budget(request: &Pdu, limit: usize) -> usize {
    let header = request.to_response(Vec::new()).encoded_size() + LENGTH_FIELD_GROWTH;
    limit.saturating_sub(header)
}

/// REPORT for a scoped request no handler accepts.
pub(super) fn unknown_pdu_handler_report(request: &Pdu, count: u32) -> Pdu {
    Pdu {
        pdu_type: PduType::Report,
        request_id: request.request_id,
        error_status: 0,
        error_index: 0,
        varbinds: vec![VarBind::new(snmp_unknown_pdu_handlers_oid(), Value::Counter32(count))],
    }
}

/// Make `response` fit `limit` octets.
///
/// A GETBULK response loses trailing varbinds (RFC 3416 Section 4.2.3).
/// Anything else becomes `tooBig` with no varbinds. `None` if not even that
/// fits.
fn fit(request: &Pdu, response: Pdu, limit: usize) -> Option<Pdu> {
    if response.encoded_size() <= limit {
        return Some(response);
    }

    if request.pdu_type == PduType::GetBulkRequest && !response.is_error() {
        let mut trimmed = response;
        while trimmed.encoded_size() > limit && trimmed.varbinds.pop().is_some() {}
        if trimmed.encoded_size() <= limit {
            return Some(trimmed);
        }
        return None;
    }

    let mut too_big = request.to_error_response(ErrorStatus::TooBig, 0);
    too_big.varbinds.clear();
    (too_big.encoded_size() <= limit).then_some(too_big)
}

impl Agent {
    /// Largest response PDU for `event`: the smaller of the agent's and the
    /// requester's message size, less the message framing.
    pub(super) fn response_limit(
        &self,
        event: &RequestEvent,
        security_name: &Bytes,
        context: &Bytes,
    ) -> usize {
        self.inner
            .config
            .max_message_size
            .min(event.max_size)
            .saturating_sub(RESPONSE_OVERHEAD + security_name.len() + context.len())
    }

    /// Size-check a response and address it to the requester.
    pub(super) fn respond(
        &self,
        event: &RequestEvent,
        security_name: &Bytes,
        context: &Bytes,
        response: Pdu,
    ) -> Option<ResponseEvent> {
        let limit = self.response_limit(event, security_name, context);
        let Some(pdu) = fit(&event.pdu, response, limit) else {
            self.inner.snmp_silent_drops.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(target: "async_snmp_agent::agent", { snmp.request_id = event.pdu.request_id, limit }, "response exceeds max message size, dropping");
            return None;
        };
        if pdu.error_status == ErrorStatus::TooBig.as_i32() {
            tracing::debug!(target: "async_snmp_agent::agent", { snmp.request_id = event.pdu.request_id, limit }, "response too big");
        }

        Some(ResponseEvent {
            pdu,
            state_ref: event.state_ref,
            destination: event.source,
            version: event.version,
            context_name: context.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::handler::{Request, RequestContext, RequestId};
    use crate::oid;

    fn subs(pdu: &Pdu) -> Vec<SubRequest> {
        let request = Arc::new(Request::new(
            RequestId(1),
            RequestContext::test_context(),
            pdu.varbinds.iter().map(|vb| vb.oid.clone()).collect(),
            1472,
        ));
        pdu.varbinds
            .iter()
            .enumerate()
            .map(|(i, vb)| SubRequest::new(request.clone(), i, vb.clone()))
            .collect()
    }

    #[test]
    fn test_first_error_wins() {
        let pdu = Pdu::set_request(
            9,
            vec![
                VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("a")),
                VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), Value::from("b")),
                VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 4, 0), Value::from("c")),
            ],
        );
        let mut subs = subs(&pdu);
        subs[1].fail(ErrorStatus::WrongType);
        subs[2].fail(ErrorStatus::NoAccess);

        let response = assemble(Version::V2c, &pdu, subs);
        assert_eq!(response.error_status_enum(), ErrorStatus::WrongType);
        assert_eq!(response.error_index, 2);
        assert_eq!(response.varbinds, pdu.varbinds);
        assert_eq!(response.pdu_type, PduType::Response);
    }

    #[test]
    fn test_v1_maps_status_and_exceptions() {
        let pdu = Pdu::get_request(
            3,
            &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), oid!(1, 3, 6, 1, 2, 1, 1, 9, 0)],
        );

        let mut answered = subs(&pdu);
        answered[0].set_value(Value::from("router"));
        answered[1].set_value(Value::NoSuchObject);
        let response = assemble(Version::V1, &pdu, answered);
        assert_eq!(response.error_status_enum(), ErrorStatus::NoSuchName);
        assert_eq!(response.error_index, 2);

        let mut failed = subs(&pdu);
        failed[0].fail(ErrorStatus::NotWritable);
        let response = assemble(Version::V1, &pdu, failed);
        assert_eq!(response.error_status_enum(), ErrorStatus::NoSuchName);

        // v2c keeps exception values in place.
        let mut answered = subs(&pdu);
        answered[1].set_value(Value::NoSuchObject);
        let response = assemble(Version::V2c, &pdu, answered);
        assert!(!response.is_error());
        assert_eq!(response.varbinds[1].value, Value::NoSuchObject);
    }

    #[test]
    fn test_fit_trims_bulk() {
        let request = Pdu::get_bulk(4, 0, 50, &[oid!(1, 3, 6, 1)]);
        let varbinds = (0..50)
            .map(|i| {
                VarBind::new(
                    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, i),
                    Value::from("interface description"),
                )
            })
            .collect();
        let response = request.to_response(varbinds);

        let fitted = fit(&request, response, 500).unwrap();
        assert!(fitted.encoded_size() <= 500);
        assert!(!fitted.varbinds.is_empty());
        assert!(fitted.varbinds.len() < 50);
        assert!(!fitted.is_error());
    }

    #[test]
    fn test_fit_too_big_then_drop() {
        let request = Pdu::get_request(5, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let response = request.to_response(vec![VarBind::new(
            oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
            Value::OctetString(Bytes::from(vec![b'x'; 600])),
        )]);

        let fitted = fit(&request, response.clone(), 400).unwrap();
        assert_eq!(fitted.error_status_enum(), ErrorStatus::TooBig);
        assert!(fitted.varbinds.is_empty());

        assert!(fit(&request, response, 5).is_none());
    }

    #[test]
    fn test_unknown_pdu_handler_report() {
        let request = Pdu {
            pdu_type: PduType::InformRequest,
            request_id: 77,
            error_status: 0,
            error_index: 0,
            varbinds: Vec::new(),
        };
        let report = unknown_pdu_handler_report(&request, 3);
        assert_eq!(report.pdu_type, PduType::Report);
        assert_eq!(report.request_id, 77);
        assert_eq!(report.varbinds[0].oid, oid!(1, 3, 6, 1, 6, 3, 11, 2, 1, 3, 0));
        assert_eq!(report.varbinds[0].value, Value::Counter32(3));
    }
}
