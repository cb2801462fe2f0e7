//! Per-object locks.
//!
//! A lock is held by a [`RequestId`] and is reentrant for that owner. Waiters
//! park on a [`Notify`] per object; a release wakes one of them, which then
//! re-checks the slot. A timed-out waiter that leaves a free lock behind
//! passes the wake-up on so no waiter is stranded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::handler::{ManagedObject, RequestId, object_key};
use crate::query::Query;

/// Decides whether a lookup must lock the object it finds.
pub trait LockStrategy: Send + Sync {
    fn is_lock_needed(&self, object: &dyn ManagedObject, query: &Query) -> bool;
}

/// Lock for writes and for volatile objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLockStrategy;

impl LockStrategy for DefaultLockStrategy {
    fn is_lock_needed(&self, object: &dyn ManagedObject, query: &Query) -> bool {
        query.is_write_intent() || object.is_volatile()
    }
}

/// Lock on every lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysLock;

impl LockStrategy for AlwaysLock {
    fn is_lock_needed(&self, _object: &dyn ManagedObject, _query: &Query) -> bool {
        true
    }
}

/// Never lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverLock;

impl LockStrategy for NeverLock {
    fn is_lock_needed(&self, _object: &dyn ManagedObject, _query: &Query) -> bool {
        false
    }
}

/// Current holder of a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockInfo {
    pub owner: RequestId,
    /// Reentrancy count, at least 1.
    pub count: u32,
    pub acquired: Instant,
}

#[derive(Default)]
struct LockSlot {
    holder: Option<LockInfo>,
    waiters: usize,
    notify: Arc<Notify>,
}

/// Lock table keyed by object identity.
#[derive(Default)]
pub struct LockManager {
    slots: Mutex<HashMap<usize, LockSlot>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock on `object` for `owner`.
    ///
    /// Waits until no other owner holds it, or until `timeout` elapses. A
    /// zero timeout waits indefinitely. Returns `false` on timeout.
    pub async fn lock(
        &self,
        owner: RequestId,
        object: &Arc<dyn ManagedObject>,
        timeout: Duration,
    ) -> bool {
        let key = object_key(object);
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);

        loop {
            let notify = {
                let mut slots = self.slots.lock();
                let slot = slots.entry(key).or_default();
                match &mut slot.holder {
                    None => {
                        slot.holder = Some(LockInfo {
                            owner,
                            count: 1,
                            acquired: Instant::now(),
                        });
                        return true;
                    }
                    Some(holder) if holder.owner == owner => {
                        holder.count += 1;
                        return true;
                    }
                    Some(_) => {
                        slot.waiters += 1;
                        slot.notify.clone()
                    }
                }
            };

            let woken = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, notify.notified())
                    .await
                    .is_ok(),
                None => {
                    notify.notified().await;
                    true
                }
            };

            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(&key) else {
                continue;
            };
            slot.waiters = slot.waiters.saturating_sub(1);
            if !woken {
                if slot.holder.is_none() {
                    if slot.waiters > 0 {
                        slot.notify.notify_one();
                    } else {
                        slots.remove(&key);
                    }
                }
                tracing::debug!(target: "async_snmp_agent::registry", { owner = %owner }, "lock wait timed out");
                return false;
            }
        }
    }

    /// Release one level of `owner`'s lock on `object`.
    ///
    /// Returns `false` and does nothing if `owner` does not hold the lock.
    pub fn unlock(&self, owner: RequestId, object: &Arc<dyn ManagedObject>) -> bool {
        let key = object_key(object);
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&key) else {
            return false;
        };
        let Some(holder) = slot.holder.as_mut().filter(|h| h.owner == owner) else {
            return false;
        };
        holder.count -= 1;
        if holder.count == 0 {
            slot.holder = None;
            if slot.waiters > 0 {
                slot.notify.notify_one();
            } else {
                slots.remove(&key);
            }
        }
        true
    }

    /// Holder of the lock on `object`, if any.
    pub fn lock_info(&self, object: &Arc<dyn ManagedObject>) -> Option<LockInfo> {
        self.slots.lock().get(&object_key(object)).and_then(|s| s.holder)
    }

    /// Number of objects currently locked or waited on.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager").field("slots", &self.len()).finish()
    }
}
