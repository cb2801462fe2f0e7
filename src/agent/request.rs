//! Request admission, routing and local dispatch.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use tracing::instrument;

use crate::error::ErrorStatus;
use crate::handler::{Request, RequestContext, RequestId, SubRequest};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::query::AccessKind;
use crate::transport::{RequestEvent, ResponseEvent};
use crate::varbind::VarBind;
use crate::version::Version;

use super::processor::Processor;
use super::proxy::ProxyKey;
use super::{Agent, response};

/// Who a request runs as and in which context, once admitted.
struct Principal {
    security_name: Bytes,
    context: Bytes,
}

impl Agent {
    /// Process one request.
    ///
    /// Returns the response to send, or `None` when the request is dropped:
    /// unknown community, non-confirmed PDU, duplicate of an in-flight
    /// request, foreign context without a proxy, or a response that cannot
    /// be made to fit.
    #[instrument(
        skip_all,
        fields(
            snmp.source = %event.source,
            snmp.request_id = event.pdu.request_id,
            snmp.pdu_type = ?event.pdu.pdu_type,
        )
    )]
    pub async fn process(&self, event: RequestEvent) -> Option<ResponseEvent> {
        if !event.pdu.pdu_type.is_confirmed() {
            tracing::debug!(target: "async_snmp_agent::agent", "ignoring non-confirmed PDU");
            return None;
        }
        let principal = self.admit(&event)?;

        let Some(id) = self.inner.tracker.begin(event.source, event.pdu.request_id) else {
            self.inner.snmp_duplicate_drops.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(target: "async_snmp_agent::agent", "dropping retransmission of in-flight request");
            return None;
        };

        let response = if self.serves(&principal.context) {
            self.process_local(&event, &principal, id).await
        } else {
            self.forward(&event, &principal).await
        };

        self.inner.tracker.finish(event.source, event.pdu.request_id, id);
        response
    }

    /// Resolve security name and context. Community-based requests go
    /// through the community table; v3 requests carry both.
    fn admit(&self, event: &RequestEvent) -> Option<Principal> {
        match event.version {
            Version::V1 | Version::V2c => match self
                .inner
                .communities
                .resolve(&event.security_name)
            {
                Some(entry) => Some(Principal {
                    security_name: entry.security_name.clone(),
                    context: entry.context_name.clone(),
                }),
                None => {
                    self.inner.snmp_in_bad_community_names.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(target: "async_snmp_agent::agent", "unknown community");
                    None
                }
            },
            Version::V3 => Some(Principal {
                security_name: event.security_name.clone(),
                context: event.context_name.clone().unwrap_or_default(),
            }),
        }
    }

    async fn forward(&self, event: &RequestEvent, principal: &Principal) -> Option<ResponseEvent> {
        let key = ProxyKey {
            context: principal.context.clone(),
            class: event.pdu.pdu_type.operation_class(),
        };
        let Some(proxy) = self.inner.proxies.get(&key).cloned() else {
            self.inner.snmp_proxy_drops.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(target: "async_snmp_agent::agent", { context = %String::from_utf8_lossy(&principal.context) }, "no proxy for foreign context");
            return None;
        };

        let mut forwarded = event.clone();
        forwarded.context_name = Some(principal.context.clone());
        let Some(mut pdu) = proxy.forward(&forwarded).await else {
            self.inner.snmp_proxy_drops.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(target: "async_snmp_agent::agent", "proxy returned no response");
            return None;
        };
        pdu.request_id = event.pdu.request_id;
        self.respond(event, &principal.security_name, &principal.context, pdu)
    }

    async fn process_local(
        &self,
        event: &RequestEvent,
        principal: &Principal,
        id: RequestId,
    ) -> Option<ResponseEvent> {
        let pdu = &event.pdu;
        let handler = match (event.version, pdu.pdu_type) {
            (Version::V1, PduType::GetBulkRequest) => None,
            (_, pdu_type) => self.inner.handlers.get(&pdu_type).cloned(),
        };
        let Some(handler) = handler else {
            let count = self.inner.snmp_unknown_pdu_handlers.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(target: "async_snmp_agent::agent", "no handler for PDU type");
            let response = if event.version == Version::V3 {
                response::unknown_pdu_handler_report(pdu, count)
            } else {
                pdu.to_error_response(ErrorStatus::GenErr, 0)
            };
            return self.respond(event, &principal.security_name, &principal.context, response);
        };

        let limit = self.response_limit(event, &principal.security_name, &principal.context);
        let context = RequestContext {
            source: event.source,
            version: event.version,
            security_model: event.security_model,
            security_name: principal.security_name.clone(),
            security_level: event.security_level,
            context_name: principal.context.clone(),
            request_id: pdu.request_id,
            pdu_type: pdu.pdu_type,
        };
        let oids: Vec<Oid> = pdu.varbinds.iter().map(|vb| vb.oid.clone()).collect();
        let request = Arc::new(Request::new(id, context, oids, limit));

        let mut subs = match self.decompose(&request, pdu) {
            Ok(subs) => subs,
            Err(index) => {
                tracing::debug!(target: "async_snmp_agent::agent", { index }, "no view for request");
                let failed = failure(&request, pdu, index, ErrorStatus::AuthorizationError);
                let response = response::assemble(event.version, pdu, vec![failed]);
                return self.respond(event, &principal.security_name, &principal.context, response);
            }
        };

        let processor = Processor::new(
            self.inner.registry.clone(),
            self.inner.access_control.clone(),
            request.clone(),
            self.inner.config.lock_timeout,
            self.inner.config.propagate_panics,
            response::varbind_budget(pdu, limit),
        );
        let handled = processor
            .guarded("handler", &Oid::empty(), handler.handle(&processor, pdu, &mut subs))
            .await;
        if handled.is_none() {
            subs = vec![failure(&request, pdu, 0, ErrorStatus::GenErr)];
        }

        let response = response::assemble(event.version, pdu, subs);
        self.respond(event, &principal.security_name, &principal.context, response)
    }

    /// One sub-request per varbind, each with its view resolved. Fails with
    /// the position of the first varbind no view applies to.
    fn decompose(&self, request: &Arc<Request>, pdu: &Pdu) -> Result<Vec<SubRequest>, usize> {
        let access = match pdu.pdu_type {
            PduType::SetRequest => AccessKind::Write,
            _ => AccessKind::Read,
        };
        let ctx = request.context();

        let mut subs = Vec::with_capacity(pdu.varbinds.len());
        for (i, vb) in pdu.varbinds.iter().enumerate() {
            let mut sub = SubRequest::new(request.clone(), i, vb.clone());
            if let Some(access_control) = &self.inner.access_control {
                let view = access_control.resolve_view(
                    &ctx.context_name,
                    &ctx.security_name,
                    ctx.security_model,
                    ctx.security_level,
                    access,
                );
                match view {
                    Some(view) => sub.set_view(Some(view)),
                    None => return Err(i),
                }
            }
            subs.push(sub);
        }
        Ok(subs)
    }
}

/// A sub-request standing for the whole request, failed at `index`.
fn failure(request: &Arc<Request>, pdu: &Pdu, index: usize, status: ErrorStatus) -> SubRequest {
    let varbind = pdu
        .varbinds
        .get(index)
        .cloned()
        .unwrap_or_else(|| VarBind::null(Oid::empty()));
    let mut sub = SubRequest::new(request.clone(), index, varbind);
    sub.fail(status);
    sub
}
