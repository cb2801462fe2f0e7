//! SNMP command responder (RFC 3413 Section 3.2).
//!
//! The [`Agent`] takes decoded [`RequestEvent`]s, admits them, routes them to
//! the local registry or a proxy, runs the PDU handler and hands back a
//! [`ResponseEvent`].
//!
//! # Features
//!
//! - **Context-partitioned registry**: managed objects register into a
//!   context or into every context at once
//! - **Atomic SET**: prepare, commit, undo and cleanup across the whole request
//! - **VACM support**: optional View-based Access Control Model (RFC 3415)
//! - **Proxy forwarding**: per context and operation class
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_snmp_agent::agent::Agent;
//! use async_snmp_agent::mib::Scalar;
//! use async_snmp_agent::pdu::Pdu;
//! use async_snmp_agent::transport::{RequestEvent, StateReference};
//! use async_snmp_agent::version::Version;
//! use async_snmp_agent::{Value, oid};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> async_snmp_agent::Result<()> {
//! let agent = Agent::builder().community("public", "public", "").build()?;
//! agent.register(
//!     Arc::new(Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("router-1"))),
//!     None,
//! )?;
//!
//! let request = RequestEvent::community(
//!     "127.0.0.1:40000".parse().unwrap(),
//!     Version::V2c,
//!     "public",
//!     Pdu::get_request(1, &[oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)]),
//!     StateReference(1),
//! );
//! let response = agent.process(request).await.unwrap();
//! assert_eq!(response.pdu.varbinds[0].value, Value::from("router-1"));
//! # Ok(())
//! # }
//! ```

mod coexistence;
mod get_handler;
mod processor;
mod proxy;
mod request;
mod response;
mod set_handler;
mod tracker;
mod vacm;

pub use coexistence::{CommunityEntry, CommunityTable};
pub use get_handler::{GetBulkHandler, GetHandler, GetNextHandler};
pub use processor::{PduHandler, Processor};
pub use proxy::Proxy;
pub use set_handler::SetHandler;
pub use tracker::RequestTracker;
pub use vacm::{AccessEntry, ContextMatch, VacmBuilder, VacmConfig, View, ViewFamily};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::handler::ManagedObject;
use crate::oid::Oid;
use crate::pdu::{OperationClass, PduType};
use crate::query::AccessControl;
use crate::registry::Registry;
use crate::scope::ContextRegion;
use crate::transport::{RequestEvent, ResponseEvent, ResponseSink};

use proxy::ProxyKey;

/// Default maximum message size for UDP (RFC 3417 recommendation).
const DEFAULT_MAX_MESSAGE_SIZE: usize = 1472;

/// Smallest message size every SNMP entity must accept (RFC 3417).
const MIN_MAX_MESSAGE_SIZE: usize = 484;

/// snmpUnknownPDUHandlers.0 (RFC 3412), the varbind of the REPORT sent for
/// an unhandled scoped request.
pub fn snmp_unknown_pdu_handlers_oid() -> Oid {
    crate::oid!(1, 3, 6, 1, 6, 3, 11, 2, 1, 3, 0)
}

/// Agent tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AgentConfig {
    /// Largest response the agent produces. Requests may lower it further.
    pub max_message_size: usize,
    /// Requests processed in parallel by [`Agent::run`]. `None` processes
    /// each request on the run loop itself.
    pub max_concurrent_requests: Option<usize>,
    /// How long a lookup waits for an object locked by another request.
    /// Zero waits forever.
    pub lock_timeout: Duration,
    /// Age after which an in-flight request stops counting for duplicate
    /// detection.
    pub max_request_lifetime: Duration,
    /// Resume panics raised by managed objects instead of answering `genErr`.
    pub propagate_panics: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_concurrent_requests: Some(1000),
            lock_timeout: Duration::from_secs(5),
            max_request_lifetime: Duration::from_secs(30),
            propagate_panics: false,
        }
    }
}

/// Builder for [`Agent`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use async_snmp_agent::agent::Agent;
/// use async_snmp_agent::handler::SecurityModel;
/// use async_snmp_agent::oid;
///
/// let agent = Agent::builder()
///     .community("public", "reader", "")
///     .community("tenant-a", "tenant", "vrf-a")
///     .context("vrf-a")
///     .lock_timeout(Duration::from_millis(500))
///     .vacm(|v| {
///         v.group("reader", SecurityModel::V2c, "readers")
///             .group("tenant", SecurityModel::V2c, "readers")
///             .access("readers", |a| a.context_prefix("").read_view("all"))
///             .view("all", |view| view.include(oid!(1, 3, 6, 1)))
///     })
///     .build()
///     .unwrap();
///
/// assert!(agent.serves(b"vrf-a"));
/// ```
pub struct AgentBuilder {
    config: AgentConfig,
    communities: CommunityTable,
    contexts: HashSet<Bytes>,
    proxies: HashMap<ProxyKey, Arc<dyn Proxy>>,
    handlers: HashMap<PduType, Arc<dyn PduHandler>>,
    access_control: Option<Arc<dyn AccessControl>>,
    registry: Option<Arc<Registry>>,
    cancel: Option<CancellationToken>,
}

impl AgentBuilder {
    /// Create a new builder with default settings.
    ///
    /// Defaults:
    /// - Max message size: 1472 bytes (Ethernet MTU - IP/UDP headers)
    /// - Max concurrent requests: 1000
    /// - Lock timeout: 5 seconds
    /// - Only the default (empty) context is served locally
    /// - No communities (all v1/v2c requests rejected)
    /// - GET, GETNEXT, GETBULK and SET handlers installed
    pub fn new() -> Self {
        let mut handlers: HashMap<PduType, Arc<dyn PduHandler>> = HashMap::new();
        handlers.insert(PduType::GetRequest, Arc::new(GetHandler));
        handlers.insert(PduType::GetNextRequest, Arc::new(GetNextHandler));
        handlers.insert(PduType::GetBulkRequest, Arc::new(GetBulkHandler));
        handlers.insert(PduType::SetRequest, Arc::new(SetHandler));

        Self {
            config: AgentConfig::default(),
            communities: CommunityTable::new(),
            contexts: HashSet::from([Bytes::new()]),
            proxies: HashMap::new(),
            handlers,
            access_control: None,
            registry: None,
            cancel: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept a v1/v2c community, mapping it to a security name and the
    /// context its requests run in.
    pub fn community(
        mut self,
        community: impl Into<Bytes>,
        security_name: impl Into<Bytes>,
        context: impl Into<Bytes>,
    ) -> Self {
        self.communities.add(community, security_name, context);
        self
    }

    /// Serve `context` locally in addition to the default context.
    pub fn context(mut self, context: impl Into<Bytes>) -> Self {
        self.contexts.insert(context.into());
        self
    }

    /// Forward requests of `class` for a context the agent does not serve.
    pub fn proxy(
        mut self,
        context: impl Into<Bytes>,
        class: OperationClass,
        proxy: Arc<dyn Proxy>,
    ) -> Self {
        self.proxies.insert(
            ProxyKey {
                context: context.into(),
                class,
            },
            proxy,
        );
        self
    }

    /// Install or replace the handler for a PDU type.
    pub fn handler(mut self, pdu_type: PduType, handler: Arc<dyn PduHandler>) -> Self {
        self.handlers.insert(pdu_type, handler);
        self
    }

    /// Enforce access control. Without it every principal sees everything.
    pub fn access_control(mut self, access_control: Arc<dyn AccessControl>) -> Self {
        self.access_control = Some(access_control);
        self
    }

    /// Enforce a VACM configuration built in place.
    pub fn vacm<F>(self, configure: F) -> Self
    where
        F: FnOnce(VacmBuilder) -> VacmBuilder,
    {
        let config = configure(VacmBuilder::new()).build();
        self.access_control(Arc::new(config))
    }

    /// Share an existing registry instead of creating one.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    pub fn max_concurrent_requests(mut self, limit: Option<usize>) -> Self {
        self.config.max_concurrent_requests = limit;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    pub fn max_request_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.max_request_lifetime = lifetime;
        self
    }

    /// Let panics in managed objects escape. Meant for tests.
    pub fn propagate_panics(mut self, propagate: bool) -> Self {
        self.config.propagate_panics = propagate;
        self
    }

    /// Set a cancellation token for graceful shutdown of [`Agent::run`].
    ///
    /// If not set, the agent creates its own token accessible via `Agent::cancel()`.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the agent.
    pub fn build(self) -> Result<Agent> {
        if self.config.max_message_size < MIN_MAX_MESSAGE_SIZE {
            return Err(Error::Config(
                format!(
                    "max message size {} is below the minimum of {}",
                    self.config.max_message_size, MIN_MAX_MESSAGE_SIZE
                )
                .into(),
            )
            .boxed());
        }
        if self.config.max_concurrent_requests == Some(0) {
            return Err(Error::Config("max concurrent requests must be at least 1".into()).boxed());
        }
        if let Some(key) = self.proxies.keys().find(|k| self.contexts.contains(&k.context)) {
            return Err(Error::Config(
                format!(
                    "context {:?} is served locally and cannot be proxied",
                    String::from_utf8_lossy(&key.context)
                )
                .into(),
            )
            .boxed());
        }

        let concurrency_limit = self
            .config
            .max_concurrent_requests
            .map(|n| Arc::new(Semaphore::new(n)));

        Ok(Agent {
            inner: Arc::new(AgentInner {
                tracker: RequestTracker::new(self.config.max_request_lifetime),
                config: self.config,
                communities: self.communities,
                contexts: self.contexts,
                proxies: self.proxies,
                handlers: self.handlers,
                access_control: self.access_control,
                registry: self.registry.unwrap_or_default(),
                concurrency_limit,
                snmp_in_bad_community_names: AtomicU32::new(0),
                snmp_proxy_drops: AtomicU32::new(0),
                snmp_unknown_pdu_handlers: AtomicU32::new(0),
                snmp_silent_drops: AtomicU32::new(0),
                snmp_duplicate_drops: AtomicU32::new(0),
                cancel: self.cancel.unwrap_or_default(),
            }),
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Inner state shared across agent clones.
pub(crate) struct AgentInner {
    pub(crate) config: AgentConfig,
    pub(crate) communities: CommunityTable,
    pub(crate) contexts: HashSet<Bytes>,
    pub(crate) proxies: HashMap<ProxyKey, Arc<dyn Proxy>>,
    pub(crate) handlers: HashMap<PduType, Arc<dyn PduHandler>>,
    pub(crate) access_control: Option<Arc<dyn AccessControl>>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) tracker: RequestTracker,
    pub(crate) concurrency_limit: Option<Arc<Semaphore>>,
    /// snmpInBadCommunityNames (1.3.6.1.2.1.11.4) - community-based messages
    /// naming an unknown community
    pub(crate) snmp_in_bad_community_names: AtomicU32,
    /// snmpProxyDrops (1.3.6.1.2.1.11.32) - requests for a foreign context
    /// that could not be forwarded or were never answered
    pub(crate) snmp_proxy_drops: AtomicU32,
    /// snmpUnknownPDUHandlers (1.3.6.1.6.3.11.2.1.3) - requests no handler
    /// was registered for
    pub(crate) snmp_unknown_pdu_handlers: AtomicU32,
    /// snmpSilentDrops (1.3.6.1.2.1.11.31) - confirmed-class PDUs silently
    /// dropped because even an empty response would exceed max message size
    pub(crate) snmp_silent_drops: AtomicU32,
    /// Retransmissions dropped while the original was still in flight.
    pub(crate) snmp_duplicate_drops: AtomicU32,
    /// Cancellation token for graceful shutdown.
    pub(crate) cancel: CancellationToken,
}

/// SNMP command responder.
///
/// Cloning is cheap; clones share the registry, counters and configuration.
#[derive(Clone)]
pub struct Agent {
    pub(crate) inner: Arc<AgentInner>,
}

impl Agent {
    /// Create a builder for configuring the agent.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// True if requests for `context` are processed locally.
    pub fn serves(&self, context: &[u8]) -> bool {
        self.inner.contexts.contains(context)
    }

    /// Register a managed object in `context`, or in every context with
    /// `None`.
    pub fn register(
        &self,
        object: Arc<dyn ManagedObject>,
        context: Option<Bytes>,
    ) -> Result<ContextRegion> {
        if let Some(context) = &context
            && !self.serves(context)
        {
            return Err(Error::UnknownContext(context.clone()).boxed());
        }
        self.inner.registry.register(object, context)
    }

    pub fn unregister(
        &self,
        object: &Arc<dyn ManagedObject>,
        context: Option<Bytes>,
    ) -> Option<ContextRegion> {
        self.inner.registry.unregister(object, context)
    }

    /// Get the cancellation token for this agent.
    ///
    /// Call `token.cancel()` to stop [`run`](Self::run).
    pub fn cancel(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Get the snmpInBadCommunityNames counter value.
    ///
    /// OID: 1.3.6.1.2.1.11.4
    pub fn snmp_in_bad_community_names(&self) -> u32 {
        self.inner.snmp_in_bad_community_names.load(Ordering::Relaxed)
    }

    /// Get the snmpProxyDrops counter value.
    ///
    /// OID: 1.3.6.1.2.1.11.32
    pub fn snmp_proxy_drops(&self) -> u32 {
        self.inner.snmp_proxy_drops.load(Ordering::Relaxed)
    }

    /// Get the snmpUnknownPDUHandlers counter value.
    ///
    /// OID: 1.3.6.1.6.3.11.2.1.3
    pub fn snmp_unknown_pdu_handlers(&self) -> u32 {
        self.inner.snmp_unknown_pdu_handlers.load(Ordering::Relaxed)
    }

    /// Get the snmpSilentDrops counter value.
    ///
    /// This counter tracks confirmed-class PDUs that were silently dropped
    /// because even an empty Response-PDU would exceed the maximum message
    /// size constraint (RFC 3412 Section 7.1).
    ///
    /// OID: 1.3.6.1.2.1.11.31
    pub fn snmp_silent_drops(&self) -> u32 {
        self.inner.snmp_silent_drops.load(Ordering::Relaxed)
    }

    /// Retransmissions dropped because the original request was still being
    /// processed.
    pub fn snmp_duplicate_drops(&self) -> u32 {
        self.inner.snmp_duplicate_drops.load(Ordering::Relaxed)
    }

    /// Requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Run the agent until the request channel closes or the cancellation
    /// token fires.
    ///
    /// Requests are processed in parallel up to `max_concurrent_requests`
    /// (default: 1000). Without a limit each request is processed on this
    /// task before the next one is received.
    #[instrument(skip_all, err)]
    pub async fn run(
        &self,
        mut requests: mpsc::Receiver<RequestEvent>,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<()> {
        loop {
            let event = tokio::select! {
                event = requests.recv() => match event {
                    Some(event) => event,
                    None => {
                        tracing::info!(target: "async_snmp_agent::agent", "request channel closed");
                        return Ok(());
                    }
                },
                _ = self.inner.cancel.cancelled() => {
                    tracing::info!(target: "async_snmp_agent::agent", "agent shutdown requested");
                    return Ok(());
                }
            };

            let Some(sem) = &self.inner.concurrency_limit else {
                if let Some(response) = self.process(event).await {
                    deliver(sink.as_ref(), response).await;
                }
                continue;
            };

            // The semaphore is owned by the agent and never closed.
            let Ok(permit) = sem.clone().acquire_owned().await else {
                return Ok(());
            };
            let agent = self.clone();
            let sink = sink.clone();
            tokio::spawn(async move {
                if let Some(response) = agent.process(event).await {
                    deliver(sink.as_ref(), response).await;
                }
                drop(permit);
            });
        }
    }
}

async fn deliver(sink: &dyn ResponseSink, response: ResponseEvent) {
    let destination = response.destination;
    let state_ref = response.state_ref;
    if let Err(e) = sink.send(response).await {
        tracing::warn!(target: "async_snmp_agent::agent", { snmp.source = %destination, state = %state_ref, error = %e }, "failed to send response");
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.inner.config)
            .field("contexts", &self.inner.contexts.len())
            .field("communities", &self.inner.communities.len())
            .field("handlers", &self.inner.handlers.len())
            .field("registry", &self.inner.registry.len())
            .finish()
    }
}
