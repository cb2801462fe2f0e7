//! In-flight request tracking.
//!
//! Every admitted request is recorded under its source address and PDU
//! request-id until its response is assembled. A retransmission that
//! arrives while the original is still being processed is recognised and
//! dropped. Entries older than the configured lifetime are evicted on the
//! next admission, so a request whose processing never finishes cannot
//! block its request-id forever.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::handler::RequestId;

#[derive(Debug)]
struct InFlight {
    id: RequestId,
    admitted: Instant,
}

/// Requests currently being processed.
#[derive(Debug)]
pub struct RequestTracker {
    lifetime: Duration,
    next_id: AtomicU64,
    entries: Mutex<HashMap<(SocketAddr, i32), InFlight>>,
}

impl RequestTracker {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            next_id: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Admit a request, returning its agent-local id, or `None` if the same
    /// request is already in flight.
    pub fn begin(&self, source: SocketAddr, request_id: i32) -> Option<RequestId> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.admitted) < self.lifetime);
        if entries.len() < before {
            tracing::debug!(target: "async_snmp_agent::agent", { evicted = before - entries.len() }, "evicted expired in-flight requests");
        }

        if entries.contains_key(&(source, request_id)) {
            return None;
        }
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entries.insert((source, request_id), InFlight { id, admitted: now });
        Some(id)
    }

    /// Forget a request. Ignored if the entry was evicted or replaced.
    pub fn finish(&self, source: SocketAddr, request_id: i32, id: RequestId) {
        let mut entries = self.entries.lock();
        if entries.get(&(source, request_id)).is_some_and(|e| e.id == id) {
            entries.remove(&(source, request_id));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
