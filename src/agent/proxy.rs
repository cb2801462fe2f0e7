//! Proxy forwarding (RFC 3413 Section 3.5).
//!
//! Requests for contexts the agent does not serve itself may be handed to a
//! [`Proxy`] registered for that context and operation class. The proxy
//! owns the downstream exchange; the agent only relays its answer.

use bytes::Bytes;

use crate::handler::BoxFuture;
use crate::pdu::{OperationClass, Pdu};
use crate::transport::RequestEvent;

/// Forwarder for one or more remote contexts.
///
/// # Example
///
/// ```rust
/// use async_snmp_agent::agent::Proxy;
/// use async_snmp_agent::handler::BoxFuture;
/// use async_snmp_agent::pdu::Pdu;
/// use async_snmp_agent::transport::RequestEvent;
/// use async_snmp_agent::{Value, VarBind};
///
/// /// Answers every read with a constant.
/// struct Constant;
///
/// impl Proxy for Constant {
///     fn forward<'a>(&'a self, request: &'a RequestEvent) -> BoxFuture<'a, Option<Pdu>> {
///         Box::pin(async move {
///             let varbinds = request
///                 .pdu
///                 .varbinds
///                 .iter()
///                 .map(|vb| VarBind::new(vb.oid.clone(), Value::Integer(1)))
///                 .collect();
///             Some(request.pdu.to_response(varbinds))
///         })
///     }
/// }
/// ```
pub trait Proxy: Send + Sync {
    /// Forward a request and wait for the downstream response.
    ///
    /// `None` means no response arrived; the request is then dropped. The
    /// returned PDU's request-id is replaced with the original one.
    fn forward<'a>(&'a self, request: &'a RequestEvent) -> BoxFuture<'a, Option<Pdu>>;
}

/// Key a proxy is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ProxyKey {
    pub(crate) context: Bytes,
    pub(crate) class: OperationClass,
}
