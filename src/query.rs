//! Registry queries.
//!
//! A [`Query`] is a region of the OID space plus what the caller intends to
//! do with the object it finds: read or write, under which authorization
//! view, on behalf of which request. The registry orders its scan by the
//! query's region and asks [`Query::matches`] whether a candidate qualifies.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::handler::{RequestId, SecurityLevel, SecurityModel};
use crate::oid::Oid;
use crate::scope::{ContextRegion, Region};

/// Kind of access a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessKind {
    Read,
    Write,
    Notify,
}

/// Authorization collaborator.
///
/// [`VacmConfig`](crate::agent::VacmConfig) is the bundled implementation.
pub trait AccessControl: Send + Sync {
    /// View name for a request, or `None` when no access entry applies.
    fn resolve_view(
        &self,
        context: &[u8],
        security_name: &[u8],
        model: SecurityModel,
        level: SecurityLevel,
        access: AccessKind,
    ) -> Option<Bytes>;

    /// True if `oid` is in the named view.
    fn is_permitted(&self, view: &[u8], oid: &Oid) -> bool;
}

/// A registry lookup.
///
/// # Example
///
/// ```
/// use async_snmp_agent::query::Query;
/// use async_snmp_agent::scope::{ContextRegion, Region};
/// use async_snmp_agent::oid;
///
/// let query = Query::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), None);
/// assert!(query.is_instance());
/// assert!(!query.is_write_intent());
///
/// let scalar = ContextRegion::universal(Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)));
/// assert!(query.matches(&scalar));
/// ```
#[derive(Clone)]
pub struct Query {
    target: ContextRegion,
    access: AccessKind,
    view: Option<Bytes>,
    source: Option<RequestId>,
    access_control: Option<Arc<dyn AccessControl>>,
}

impl Query {
    /// Read query over `region` in `context` (`None` = every context).
    pub fn new(region: Region, context: Option<Bytes>) -> Self {
        Self {
            target: ContextRegion::new(context, region),
            access: AccessKind::Read,
            view: None,
            source: None,
            access_control: None,
        }
    }

    /// Query for exactly one instance.
    pub fn instance(oid: &Oid, context: Option<Bytes>) -> Self {
        Self::new(Region::instance(oid), context)
    }

    /// Successor query: anything inside `cursor`.
    pub fn successor(cursor: Region, context: Option<Bytes>) -> Self {
        Self::new(cursor, context)
    }

    pub fn with_access(mut self, access: AccessKind) -> Self {
        self.access = access;
        self
    }

    /// Restrict matches to OIDs inside `view`, as judged by `access_control`.
    pub fn with_view(
        mut self,
        view: Option<Bytes>,
        access_control: Arc<dyn AccessControl>,
    ) -> Self {
        self.view = view;
        self.access_control = Some(access_control);
        self
    }

    pub fn with_source(mut self, source: RequestId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn region(&self) -> &Region {
        self.target.region()
    }

    pub fn context(&self) -> Option<&Bytes> {
        self.target.context()
    }

    pub fn target(&self) -> &ContextRegion {
        &self.target
    }

    pub fn access(&self) -> AccessKind {
        self.access
    }

    pub fn is_write_intent(&self) -> bool {
        self.access == AccessKind::Write
    }

    pub fn view(&self) -> Option<&Bytes> {
        self.view.as_ref()
    }

    /// The request this query was issued for. Listeners use it to refresh
    /// an object only once per request.
    pub fn source(&self) -> Option<RequestId> {
        self.source
    }

    /// True if the region names a single instance.
    pub fn is_instance(&self) -> bool {
        let region = self.region();
        region.is_lower_included()
            && region.is_upper_included()
            && region.upper() == Some(region.lower())
    }

    /// True if `oid` passes the query's view. Without access control
    /// everything is permitted; with access control but no view, nothing is.
    pub fn is_permitted(&self, oid: &Oid) -> bool {
        match &self.access_control {
            None => true,
            Some(access_control) => match &self.view {
                Some(view) => access_control.is_permitted(view, oid),
                None => false,
            },
        }
    }

    /// Match predicate applied to each registry candidate.
    ///
    /// Instance queries require the object's region to cover the instance and
    /// the instance to be in the view. Successor queries require the object
    /// to hold some OID inside the cursor; the view is checked per instance
    /// once the object names one.
    pub fn matches(&self, candidate: &ContextRegion) -> bool {
        if !candidate.context_matches(self.context()) {
            return false;
        }
        if self.is_instance() {
            let oid = self.region().lower();
            candidate.region().covers_oid(oid) && self.is_permitted(oid)
        } else {
            candidate.region().overlaps(self.region())
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("target", &self.target)
            .field("access", &self.access)
            .field("view", &self.view)
            .field("source", &self.source)
            .field("access_control", &self.access_control.is_some())
            .finish()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.access, self.target)
    }
}
