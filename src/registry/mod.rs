//! The managed object registry.
//!
//! Objects are registered over a [`ContextRegion`] and stored in one ordered
//! partition per context (see [`RegionOrd`]). Regions never overlap within a
//! context or between a context and the universal partition.
//!
//! Writers build a new snapshot and publish it atomically; lookups and
//! iteration work on whatever snapshot was current when they started, so
//! they never block registration.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example(sys_descr: std::sync::Arc<dyn async_snmp_agent::handler::ManagedObject>) -> async_snmp_agent::Result<()> {
//! use async_snmp_agent::query::Query;
//! use async_snmp_agent::registry::Registry;
//! use async_snmp_agent::oid;
//!
//! let registry = Registry::new();
//! registry.register(sys_descr, None)?;
//!
//! let query = Query::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Some(Default::default()));
//! let lookup = registry.lookup(&query, None).await;
//! assert!(lookup.found.is_some());
//! # Ok(())
//! # }
//! ```

mod events;
mod lock;
mod order;

pub use events::{LookupEvent, LookupListener, RegistrationListener, RegistryEvent};
pub use lock::{AlwaysLock, DefaultLockStrategy, LockInfo, LockManager, LockStrategy, NeverLock};
pub use order::RegionOrd;

use std::collections::BTreeMap;
use std::collections::btree_map::Range;
use std::fmt;
use std::iter::Peekable;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::handler::{ManagedObject, RequestId, object_key};
use crate::query::Query;
use crate::scope::{ContextRegion, Region};

/// A registry entry.
#[derive(Clone)]
pub struct RegisteredObject {
    region: ContextRegion,
    object: Arc<dyn ManagedObject>,
}

impl RegisteredObject {
    /// Region the object was registered over.
    pub fn region(&self) -> &ContextRegion {
        &self.region
    }

    pub fn object(&self) -> &Arc<dyn ManagedObject> {
        &self.object
    }
}

impl fmt::Debug for RegisteredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredObject")
            .field("region", &self.region)
            .field("object", &format_args!("{:#x}", object_key(&self.object)))
            .finish()
    }
}

/// Lock to take on the object a lookup returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub owner: RequestId,
    /// Zero waits indefinitely.
    pub timeout: Duration,
}

/// Outcome of [`Registry::lookup`].
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    pub found: Option<RegisteredObject>,
    /// The returned object is locked for the requesting owner.
    pub locked: bool,
    /// At least one candidate was skipped because its lock timed out.
    pub lock_timed_out: bool,
}

type Partition = BTreeMap<RegionOrd, RegisteredObject>;

#[derive(Clone, Default)]
struct Snapshot {
    partitions: BTreeMap<Option<Bytes>, Partition>,
}

impl Snapshot {
    /// Partitions visible from `context`: the universal one plus the named
    /// one, or all of them for a universal query.
    fn visible<'a>(
        &'a self,
        context: Option<&'a Bytes>,
    ) -> impl Iterator<Item = &'a Partition> + 'a {
        self.partitions
            .iter()
            .filter(move |(key, _)| match (key, context) {
                (None, _) | (_, None) => true,
                (Some(mine), Some(wanted)) => mine == wanted,
            })
            .map(|(_, partition)| partition)
    }

    fn conflict<'a>(&'a self, incoming: &'a ContextRegion) -> Option<&'a RegisteredObject> {
        let probe = RegionOrd::probe(incoming.region());
        self.visible(incoming.context()).find_map(|partition| {
            partition
                .range(probe.clone()..)
                .next()
                .map(|(_, entry)| entry)
                .filter(|entry| entry.region.region().overlaps(incoming.region()))
        })
    }

    fn insert(&mut self, entry: RegisteredObject) {
        let key = RegionOrd::of_region(entry.region.region());
        self.partitions
            .entry(entry.region.context().cloned())
            .or_default()
            .insert(key, entry);
    }

    /// Remove `key`'s entry, first by its current region, then by scanning
    /// the context's partition.
    fn remove(&mut self, key: usize, region: &ContextRegion) -> Option<RegisteredObject> {
        let context = region.context().cloned();
        let partition = self.partitions.get_mut(&context)?;

        let exact = RegionOrd::of_region(region.region());
        let found = match partition.get(&exact) {
            Some(entry) if object_key(&entry.object) == key => Some(exact),
            _ => partition
                .iter()
                .find(|(_, entry)| object_key(&entry.object) == key)
                .map(|(ord, _)| ord.clone()),
        };
        let removed = partition.remove(&found?);
        if partition.is_empty() {
            self.partitions.remove(&context);
        }
        removed
    }

    fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }
}

type Cursor<'a> = Peekable<Range<'a, RegionOrd, RegisteredObject>>;

/// Pop the next candidate across partition cursors in comparator order.
///
/// A partition is dropped once its next entry starts beyond `region`.
fn next_candidate<'a>(
    cursors: &mut Vec<Cursor<'a>>,
    region: &Region,
) -> Option<&'a RegisteredObject> {
    loop {
        let mut best: Option<(usize, &'a RegionOrd)> = None;
        for (i, cursor) in cursors.iter_mut().enumerate() {
            if let Some((key, _)) = cursor.peek() {
                if best.is_none_or(|(_, current)| *key < current) {
                    best = Some((i, *key));
                }
            }
        }
        let (i, _) = best?;
        let (_, entry) = cursors[i].next()?;
        if entry.region.region().starts_before_end_of(region) {
            return Some(entry);
        }
        drop(cursors.swap_remove(i));
    }
}

/// Registry of managed objects, with the lock table guarding them.
pub struct Registry {
    snap: ArcSwap<Snapshot>,
    locks: LockManager,
    lock_strategy: Arc<dyn LockStrategy>,
    lookup_listeners: RwLock<Vec<(Option<usize>, Arc<dyn LookupListener>)>>,
    registration_listeners: RwLock<Vec<Arc<dyn RegistrationListener>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry with the [`DefaultLockStrategy`].
    pub fn new() -> Self {
        Self::with_lock_strategy(Arc::new(DefaultLockStrategy))
    }

    pub fn with_lock_strategy(lock_strategy: Arc<dyn LockStrategy>) -> Self {
        Self {
            snap: ArcSwap::from_pointee(Snapshot::default()),
            locks: LockManager::new(),
            lock_strategy,
            lookup_listeners: RwLock::new(Vec::new()),
            registration_listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register `object` over its region in `context` (`None` = universal).
    ///
    /// Fails with [`Error::DuplicateRegistration`] if the region overlaps an
    /// object already registered in the same context or the universal one.
    /// A universal registration is checked against every context.
    pub fn register(
        &self,
        object: Arc<dyn ManagedObject>,
        context: Option<Bytes>,
    ) -> Result<ContextRegion> {
        let region = ContextRegion::new(context, object.region());
        if region.region().is_empty() {
            return Err(Error::Config(
                format!("cannot register empty region {}", region).into(),
            )
            .boxed());
        }

        loop {
            let cur = self.snap.load_full();
            if let Some(existing) = cur.conflict(&region) {
                tracing::debug!(target: "async_snmp_agent::registry", { existing = %existing.region, incoming = %region }, "duplicate registration");
                return Err(Error::DuplicateRegistration {
                    existing: existing.region.clone(),
                    incoming: region,
                }
                .boxed());
            }

            let mut next = (*cur).clone();
            next.insert(RegisteredObject {
                region: region.clone(),
                object: object.clone(),
            });
            let prev = self.snap.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&prev, &cur) {
                break;
            }
        }

        tracing::debug!(target: "async_snmp_agent::registry", { region = %region }, "registered");
        self.notify_registration(&RegistryEvent::Added(region.clone()));
        Ok(region)
    }

    /// Remove `object` from `context`.
    ///
    /// Looks the entry up by the object's current region first, then by
    /// identity, so an object whose region changed can still be removed.
    /// Returns the region it was registered over.
    pub fn unregister(
        &self,
        object: &Arc<dyn ManagedObject>,
        context: Option<Bytes>,
    ) -> Option<ContextRegion> {
        let key = object_key(object);
        let region = ContextRegion::new(context, object.region());

        let removed = loop {
            let cur = self.snap.load_full();
            let mut next = (*cur).clone();
            let removed = next.remove(key, &region)?;
            let prev = self.snap.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&prev, &cur) {
                break removed;
            }
        };

        tracing::debug!(target: "async_snmp_agent::registry", { region = %removed.region }, "unregistered");
        self.lookup_listeners.write().retain(|(owner, _)| *owner != Some(key));
        self.notify_registration(&RegistryEvent::Removed(removed.region.clone()));
        Some(removed.region)
    }

    /// Find the first object matching `query`.
    ///
    /// Candidates are visited in comparator order from the query's lower
    /// bound. For each overlapping candidate the query listeners fire, the
    /// lock is taken if `lock` is given and the lock strategy asks for it,
    /// and the query's match predicate decides. A candidate whose lock
    /// times out is skipped as if absent.
    pub async fn lookup(&self, query: &Query, lock: Option<LockRequest>) -> Lookup {
        let snap = self.snap.load_full();
        let probe = RegionOrd::probe(query.region());
        let mut cursors: Vec<Cursor<'_>> = snap
            .visible(query.context())
            .map(|partition| partition.range(probe.clone()..).peekable())
            .collect();
        let mut lock_timed_out = false;

        while let Some(entry) = next_candidate(&mut cursors, query.region()) {
            if !entry.region.context_matches(query.context())
                || !entry.region.region().overlaps(query.region())
            {
                continue;
            }

            let event = LookupEvent {
                object: &entry.object,
                region: &entry.region,
                query,
            };
            self.fire(&event, |l, e| l.query_event(e));

            let mut held = None;
            if let Some(request) = lock {
                if self.lock_strategy.is_lock_needed(entry.object.as_ref(), query) {
                    if !self.locks.lock(request.owner, &entry.object, request.timeout).await {
                        tracing::debug!(target: "async_snmp_agent::registry", { region = %entry.region, owner = %request.owner }, "skipping object, lock timed out");
                        lock_timed_out = true;
                        continue;
                    }
                    held = Some(request.owner);
                }
            }

            if !query.matches(&entry.region) {
                if let Some(owner) = held {
                    self.locks.unlock(owner, &entry.object);
                }
                continue;
            }

            self.fire(&event, |l, e| l.lookup_event(e));
            return Lookup {
                found: Some(entry.clone()),
                locked: held.is_some(),
                lock_timed_out,
            };
        }

        Lookup {
            found: None,
            locked: false,
            lock_timed_out,
        }
    }

    /// Lock `object` for `owner`. See [`LockManager::lock`].
    pub async fn lock(
        &self,
        owner: RequestId,
        object: &Arc<dyn ManagedObject>,
        timeout: Duration,
    ) -> bool {
        self.locks.lock(owner, object, timeout).await
    }

    /// Release one level of `owner`'s lock. Non-owners are ignored.
    pub fn unlock(&self, owner: RequestId, object: &Arc<dyn ManagedObject>) -> bool {
        self.locks.unlock(owner, object)
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn lock_strategy(&self) -> &Arc<dyn LockStrategy> {
        &self.lock_strategy
    }

    /// Listen to lookups of `object`, or of every object when `None`.
    ///
    /// Per-object listeners are dropped when the object is unregistered.
    pub fn add_lookup_listener(
        &self,
        listener: Arc<dyn LookupListener>,
        object: Option<&Arc<dyn ManagedObject>>,
    ) {
        self.lookup_listeners.write().push((object.map(object_key), listener));
    }

    pub fn remove_lookup_listener(&self, listener: &Arc<dyn LookupListener>) {
        let target = Arc::as_ptr(listener) as *const ();
        self.lookup_listeners
            .write()
            .retain(|(_, l)| Arc::as_ptr(l) as *const () != target);
    }

    pub fn add_registration_listener(&self, listener: Arc<dyn RegistrationListener>) {
        self.registration_listeners.write().push(listener);
    }

    /// Point-in-time view for iteration.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            inner: self.snap.load_full(),
        }
    }

    pub fn len(&self) -> usize {
        self.snap.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fire(&self, event: &LookupEvent<'_>, f: impl Fn(&dyn LookupListener, &LookupEvent<'_>)) {
        for listener in self.listeners_of(event.object) {
            f(listener.as_ref(), event);
        }
    }

    /// Listeners interested in `object`, copied out so that a callback may
    /// change the registry.
    fn listeners_of(&self, object: &Arc<dyn ManagedObject>) -> Vec<Arc<dyn LookupListener>> {
        let key = object_key(object);
        self.lookup_listeners
            .read()
            .iter()
            .filter(|(owner, _)| owner.is_none_or(|owner| owner == key))
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    fn notify_registration(&self, event: &RegistryEvent) {
        let listeners = self.registration_listeners.read().clone();
        for listener in listeners {
            listener.registry_changed(event);
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("objects", &self.len())
            .field("locks", &self.locks)
            .finish()
    }
}

/// Immutable view of the registry taken by [`Registry::snapshot`].
///
/// Later registrations and removals do not affect it.
#[derive(Clone)]
pub struct RegistrySnapshot {
    inner: Arc<Snapshot>,
}

impl RegistrySnapshot {
    /// Entries by context (universal first), then in region order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredObject> {
        self.inner.partitions.values().flat_map(BTreeMap::values)
    }

    /// Entries of one context partition only.
    pub fn context(&self, context: Option<&Bytes>) -> impl Iterator<Item = &RegisteredObject> {
        self.inner
            .partitions
            .get(&context.cloned())
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.partitions.is_empty()
    }
}

impl fmt::Debug for RegistrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|e| &e.region)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxFuture, SubRequest};
    use crate::oid;
    use crate::oid::Oid;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        region: parking_lot::Mutex<Region>,
        volatile: bool,
    }

    impl Fixed {
        fn new(region: Region) -> Arc<dyn ManagedObject> {
            Arc::new(Self {
                region: parking_lot::Mutex::new(region),
                volatile: false,
            })
        }
    }

    impl ManagedObject for Fixed {
        fn region(&self) -> Region {
            self.region.lock().clone()
        }

        fn find<'a>(
            &'a self,
            range: &'a Region,
            _sub: &'a SubRequest,
        ) -> BoxFuture<'a, Option<Oid>> {
            let region = self.region();
            Box::pin(async move {
                range
                    .covers_oid(region.lower())
                    .then(|| region.lower().clone())
            })
        }

        fn get<'a>(&'a self, _sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
            Box::pin(async {})
        }

        fn is_volatile(&self) -> bool {
            self.volatile
        }
    }

    fn ctx(name: &'static str) -> Option<Bytes> {
        Some(Bytes::from_static(name.as_bytes()))
    }

    fn found_region(lookup: &Lookup) -> Option<&Region> {
        lookup.found.as_ref().map(|e| e.region().region())
    }

    #[test]
    fn test_duplicate_in_same_context() {
        let registry = Registry::new();
        registry
            .register(Fixed::new(Region::subtree(&oid!(1, 3, 6, 1, 2, 1, 1))), ctx("a"))
            .unwrap();
        let err = registry
            .register(Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0))), ctx("a"))
            .unwrap_err();
        match *err {
            Error::DuplicateRegistration { existing, incoming } => {
                assert_eq!(existing.region(), &Region::subtree(&oid!(1, 3, 6, 1, 2, 1, 1)));
                assert_eq!(incoming.region(), &Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_disjoint_contexts_coexist() {
        let registry = Registry::new();
        let region = Region::subtree(&oid!(1, 3, 6, 1, 2, 1, 1));
        registry.register(Fixed::new(region.clone()), ctx("a")).unwrap();
        registry.register(Fixed::new(region.clone()), ctx("b")).unwrap();
        assert_eq!(registry.len(), 2);

        // The universal context conflicts with both.
        assert!(registry.register(Fixed::new(region), None).is_err());
    }

    #[test]
    fn test_universal_blocks_named_context() {
        let registry = Registry::new();
        registry
            .register(Fixed::new(Region::subtree(&oid!(1, 3, 6, 1, 2, 1, 1))), None)
            .unwrap();
        assert!(
            registry
                .register(Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0))), ctx("a"))
                .is_err()
        );
        // Adjacent regions do not overlap.
        registry
            .register(Fixed::new(Region::subtree(&oid!(1, 3, 6, 1, 2, 1, 2))), ctx("a"))
            .unwrap();
    }

    #[test]
    fn test_empty_region_rejected() {
        let registry = Registry::new();
        let empty = Region::new(oid!(1, 5), false, Some(oid!(1, 5)), false);
        assert!(registry.register(Fixed::new(empty), None).is_err());
    }

    #[test]
    fn test_unregister_then_register_again() {
        let registry = Registry::new();
        let region = Region::subtree(&oid!(1, 3, 6, 1, 4, 1, 9999));
        let first = Fixed::new(region.clone());
        registry.register(first.clone(), None).unwrap();
        assert_eq!(
            registry.unregister(&first, None).map(|r| r.into_region()),
            Some(region.clone())
        );
        assert!(registry.unregister(&first, None).is_none());
        registry.register(Fixed::new(region), None).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_after_region_changed() {
        let registry = Registry::new();
        let object = Arc::new(Fixed {
            region: parking_lot::Mutex::new(Region::subtree(&oid!(1, 3, 6, 1, 4, 1, 1))),
            volatile: false,
        });
        let dyn_object: Arc<dyn ManagedObject> = object.clone();
        registry.register(dyn_object.clone(), ctx("a")).unwrap();

        *object.region.lock() = Region::subtree(&oid!(1, 3, 6, 1, 4, 1, 2));
        let removed = registry.unregister(&dyn_object, ctx("a")).unwrap();
        assert_eq!(removed.region(), &Region::subtree(&oid!(1, 3, 6, 1, 4, 1, 1)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_scalar_lookup() {
        let registry = Registry::new();
        registry
            .register(Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0))), None)
            .unwrap();

        let hit = registry
            .lookup(&Query::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), ctx("")), None)
            .await;
        assert!(hit.found.is_some());

        let miss = registry
            .lookup(&Query::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), ctx("")), None)
            .await;
        assert!(miss.found.is_none());

        let next = registry
            .lookup(&Query::successor(Region::after(&oid!(1, 3, 6, 1, 2, 1, 1, 0)), ctx("")), None)
            .await;
        assert_eq!(found_region(&next), Some(&Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0))));
    }

    #[tokio::test]
    async fn test_successor_merges_partitions() {
        let registry = Registry::new();
        registry
            .register(Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 3, 0))), None)
            .unwrap();
        registry
            .register(Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0))), ctx("a"))
            .unwrap();
        registry
            .register(Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 2, 0))), ctx("b"))
            .unwrap();

        let mut cursor = Region::after(&oid!(1, 3, 6, 1));
        let mut seen = Vec::new();
        loop {
            let lookup = registry.lookup(&Query::successor(cursor.clone(), ctx("a")), None).await;
            let Some(entry) = lookup.found else { break };
            seen.push(entry.region().region().lower().clone());
            cursor.subtract(entry.region().region());
        }
        assert_eq!(seen, vec![oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_timeout_skips_candidate() {
        let registry = Registry::new();
        let object = Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)));
        registry.register(object.clone(), None).unwrap();
        assert!(registry.lock(RequestId(1), &object, Duration::ZERO).await);

        let query = Query::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), ctx(""))
            .with_access(crate::query::AccessKind::Write);
        let lock = LockRequest {
            owner: RequestId(2),
            timeout: Duration::from_millis(100),
        };
        let lookup = registry.lookup(&query, Some(lock)).await;
        assert!(lookup.found.is_none());
        assert!(lookup.lock_timed_out);

        registry.unlock(RequestId(1), &object);
        let lookup = registry.lookup(&query, Some(lock)).await;
        assert!(lookup.found.is_some());
        assert!(lookup.locked);
        assert!(registry.unlock(RequestId(2), &object));
    }

    #[tokio::test]
    async fn test_read_without_lock_for_stable_objects() {
        let registry = Registry::new();
        let object = Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)));
        registry.register(object, None).unwrap();
        let lock = LockRequest {
            owner: RequestId(7),
            timeout: Duration::ZERO,
        };
        let lookup = registry
            .lookup(&Query::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), ctx("")), Some(lock))
            .await;
        assert!(lookup.found.is_some());
        assert!(!lookup.locked);
        assert!(registry.locks().is_empty());
    }

    #[derive(Default)]
    struct Counting {
        queried: AtomicUsize,
        looked_up: AtomicUsize,
    }

    impl LookupListener for Counting {
        fn query_event(&self, _event: &LookupEvent<'_>) {
            self.queried.fetch_add(1, Ordering::Relaxed);
        }

        fn lookup_event(&self, _event: &LookupEvent<'_>) {
            self.looked_up.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn test_listeners_per_object() {
        let registry = Registry::new();
        let watched = Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)));
        let other = Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)));
        registry.register(watched.clone(), None).unwrap();
        registry.register(other, None).unwrap();

        let counting = Arc::new(Counting::default());
        registry.add_lookup_listener(counting.clone(), Some(&watched));

        registry
            .lookup(&Query::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), ctx("")), None)
            .await;
        registry
            .lookup(&Query::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), ctx("")), None)
            .await;
        assert_eq!(counting.queried.load(Ordering::Relaxed), 1);
        assert_eq!(counting.looked_up.load(Ordering::Relaxed), 1);

        registry.unregister(&watched, None);
        registry.register(watched, None).unwrap();
        registry
            .lookup(&Query::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), ctx("")), None)
            .await;
        assert_eq!(counting.looked_up.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_snapshot_is_stable() {
        let registry = Registry::new();
        registry
            .register(Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 2, 0))), None)
            .unwrap();
        registry
            .register(Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0))), None)
            .unwrap();
        let snapshot = registry.snapshot();
        registry
            .register(Fixed::new(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 3, 0))), None)
            .unwrap();

        let lowers: Vec<_> = snapshot.iter().map(|e| e.region().region().lower().clone()).collect();
        assert_eq!(lowers, vec![oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)]);
        assert_eq!(registry.snapshot().len(), 3);
    }

    #[derive(Default)]
    struct Recorder(parking_lot::Mutex<Vec<RegistryEvent>>);

    impl RegistrationListener for Recorder {
        fn registry_changed(&self, event: &RegistryEvent) {
            self.0.lock().push(event.clone());
        }
    }

    #[test]
    fn test_registration_events() {
        let registry = Registry::new();
        let recorder = Arc::new(Recorder::default());
        registry.add_registration_listener(recorder.clone());

        let object = Fixed::new(Region::subtree(&oid!(1, 3, 6, 1, 4, 1, 1)));
        let region = registry.register(object.clone(), None).unwrap();
        registry.unregister(&object, None);
        assert_eq!(
            *recorder.0.lock(),
            vec![RegistryEvent::Added(region.clone()), RegistryEvent::Removed(region)]
        );
    }
}
