//! Per-request processing context shared by the PDU handlers.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::handler::{BoxFuture, Request, SubRequest};
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::query::{AccessControl, AccessKind, Query};
use crate::registry::{LockRequest, Lookup, Registry};
use crate::scope::Region;
use crate::version::Version;

/// Processes one PDU type.
///
/// The agent decomposes a request into sub-requests (one per varbind, with
/// the authorization view already resolved) and hands them to the handler
/// registered for the PDU type. The handler records the outcome on the
/// sub-requests; it may also replace them, as GETBULK does with its
/// repetitions. The agent assembles the response from whatever `subs`
/// holds when the future completes.
///
/// GET, GETNEXT, GETBULK and SET handlers are installed by default.
/// Registering a handler for another type (for example `InformRequest`)
/// makes the agent answer it instead of counting it as unhandled.
pub trait PduHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        processor: &'a Processor,
        pdu: &'a Pdu,
        subs: &'a mut Vec<SubRequest>,
    ) -> BoxFuture<'a, ()>;
}

/// What a [`PduHandler`] works with: the request, the registry and the
/// agent policies that apply to it.
pub struct Processor {
    registry: Arc<Registry>,
    access_control: Option<Arc<dyn AccessControl>>,
    request: Arc<Request>,
    lock_timeout: Duration,
    propagate_panics: bool,
    budget: usize,
}

impl Processor {
    pub(crate) fn new(
        registry: Arc<Registry>,
        access_control: Option<Arc<dyn AccessControl>>,
        request: Arc<Request>,
        lock_timeout: Duration,
        propagate_panics: bool,
        budget: usize,
    ) -> Self {
        Self {
            registry,
            access_control,
            request,
            lock_timeout,
            propagate_panics,
            budget,
        }
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn version(&self) -> Version {
        self.request.context().version
    }

    /// Octets available for response varbinds.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Query on behalf of `sub` in the request's context, restricted to the
    /// sub-request's view when access control is active.
    pub fn query(&self, sub: &SubRequest, region: Region, access: AccessKind) -> Query {
        let query = Query::new(region, Some(self.request.context_name().clone()))
            .with_access(access)
            .with_source(self.request.id());
        match &self.access_control {
            Some(access_control) => query.with_view(sub.view().cloned(), access_control.clone()),
            None => query,
        }
    }

    /// Look up and lock (per the registry's lock strategy) on behalf of this
    /// request. Pair with [`release`](Self::release).
    pub async fn lookup(&self, query: &Query) -> Lookup {
        let lock = LockRequest {
            owner: self.request.id(),
            timeout: self.lock_timeout,
        };
        let lookup = self.registry.lookup(query, Some(lock)).await;
        if lookup.lock_timed_out {
            tracing::debug!(target: "async_snmp_agent::agent", { snmp.request_id = %self.request.id(), query = %query }, "lock timed out during lookup");
        }
        lookup
    }

    /// Release the lock a lookup acquired, if any.
    pub fn release(&self, lookup: &Lookup) {
        if let (true, Some(found)) = (lookup.locked, &lookup.found) {
            self.registry.unlock(self.request.id(), found.object());
        }
    }

    /// Run a managed-object future, recovering from a panic.
    ///
    /// Returns `None` if the future panicked. With `propagate_panics` set
    /// the panic is resumed instead.
    pub async fn guarded<T>(
        &self,
        phase: &'static str,
        oid: &Oid,
        fut: impl Future<Output = T>,
    ) -> Option<T> {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(value) => Some(value),
            Err(panic) => {
                if self.propagate_panics {
                    std::panic::resume_unwind(panic);
                }
                tracing::warn!(target: "async_snmp_agent::agent", { snmp.request_id = %self.request.id(), snmp.oid = %oid, phase, panic = panic_message(&*panic) }, "managed object panicked");
                None
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
