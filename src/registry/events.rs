//! Registry listeners.

use std::sync::Arc;

use crate::handler::ManagedObject;
use crate::query::Query;
use crate::scope::ContextRegion;

/// A lookup step, as seen by a [`LookupListener`].
pub struct LookupEvent<'a> {
    pub object: &'a Arc<dyn ManagedObject>,
    pub region: &'a ContextRegion,
    pub query: &'a Query,
}

/// Observer of registry lookups.
///
/// Both callbacks run synchronously on the lookup path and must not block.
/// They may register and unregister objects or listeners; the lookup in
/// progress keeps working on the snapshot it started from.
pub trait LookupListener: Send + Sync {
    /// The object is about to be tested against the query. Volatile objects
    /// refresh their content here; [`Query::source`] tells repeated calls
    /// for the same request apart.
    fn query_event(&self, event: &LookupEvent<'_>) {
        let _ = event;
    }

    /// The object matched and is being returned.
    fn lookup_event(&self, event: &LookupEvent<'_>) {
        let _ = event;
    }
}

/// Change to the set of registered objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Added(ContextRegion),
    Removed(ContextRegion),
}

/// Observer of registrations.
pub trait RegistrationListener: Send + Sync {
    fn registry_changed(&self, event: &RegistryEvent);
}
