//! Managed object capability traits.
//!
//! A managed object serves one [`Region`] of the OID space. The agent finds
//! it through the [`Registry`](crate::registry::Registry) and drives it
//! through these traits:
//!
//! - [`ManagedObject`] - required: region, successor search and read
//! - [`Transactional`] - optional: the four SET phases
//! - [`Persistable`] - optional: snapshot to and from varbinds
//!
//! Capabilities are discovered at runtime through
//! [`ManagedObject::as_transactional`] and [`ManagedObject::as_persistable`].
//! An object without [`Transactional`] answers every SET with `notWritable`.
//!
//! All methods that may touch external state are async and return a
//! [`BoxFuture`], so objects can be backed by a database or another process.
//!
//! # Example
//!
//! ```rust
//! use async_snmp_agent::handler::{BoxFuture, ManagedObject, SubRequest};
//! use async_snmp_agent::scope::Region;
//! use async_snmp_agent::{Oid, Value, oid};
//!
//! /// sysUpTime.0 computed on every read.
//! struct Uptime {
//!     oid: Oid,
//!     started: std::time::Instant,
//! }
//!
//! impl ManagedObject for Uptime {
//!     fn region(&self) -> Region {
//!         Region::instance(&self.oid)
//!     }
//!
//!     fn find<'a>(&'a self, range: &'a Region, _sub: &'a SubRequest) -> BoxFuture<'a, Option<Oid>> {
//!         let found = range.covers_oid(&self.oid).then(|| self.oid.clone());
//!         Box::pin(async move { found })
//!     }
//!
//!     fn get<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
//!         Box::pin(async move {
//!             if sub.oid() == &self.oid {
//!                 let ticks = (self.started.elapsed().as_millis() / 10) as u32;
//!                 sub.set_value(Value::TimeTicks(ticks));
//!             } else {
//!                 sub.set_value(Value::NoSuchInstance);
//!             }
//!         })
//!     }
//! }
//!
//! let uptime = Uptime { oid: oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), started: std::time::Instant::now() };
//! assert!(uptime.region().covers_oid(&oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)));
//! ```

mod context;
mod request;

pub use context::{RequestContext, SecurityLevel, SecurityModel};
pub use request::{Request, RequestId, RequestScratch, SetPhase, SubRequest};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::oid::Oid;
use crate::scope::Region;
use crate::varbind::VarBind;

/// Type alias for boxed async return type.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An entity serving a region of the OID space.
pub trait ManagedObject: Send + Sync + 'static {
    /// The region this object occupies. Must not change while registered.
    fn region(&self) -> Region;

    /// First instance inside `range` this object can serve, in OID order.
    ///
    /// Unreadable instances are skipped. `None` when the object has nothing
    /// inside `range`.
    fn find<'a>(&'a self, range: &'a Region, sub: &'a SubRequest) -> BoxFuture<'a, Option<Oid>>;

    /// Read the instance named by `sub.oid()` into the sub-request.
    ///
    /// A missing instance is answered with
    /// [`Value::NoSuchInstance`](crate::Value::NoSuchInstance) and an
    /// unreadable one with [`Value::NoSuchObject`](crate::Value::NoSuchObject).
    fn get<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()>;

    /// Objects whose content must be refreshed before they are queried.
    ///
    /// The default lock strategy locks volatile objects for reads too.
    fn is_volatile(&self) -> bool {
        false
    }

    fn as_transactional(&self) -> Option<&dyn Transactional> {
        None
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        None
    }
}

/// The SET phases (RFC 3416 Section 4.2.5).
///
/// Phases record their outcome on the sub-request with
/// [`SubRequest::fail`]; leaving the status untouched means success.
pub trait Transactional: Send + Sync {
    /// Validate the new value and stage it. Nothing becomes visible yet.
    fn prepare<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()>;

    /// Apply the staged value, capturing the previous one for undo.
    fn commit<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()>;

    /// Restore the value captured at commit.
    fn undo<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()>;

    /// Release whatever prepare or commit left behind. Always called.
    fn cleanup<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()>;
}

/// Snapshot of an object's state as varbinds. The agent never calls this;
/// MIB modules use it to save and restore their objects.
pub trait Persistable: Send + Sync {
    /// Every persistent instance with its value, in OID order.
    fn save(&self) -> Vec<VarBind>;

    /// Replace the object's state with `varbinds`.
    fn load(&self, varbinds: &[VarBind]) -> Result<()>;
}

/// Stable identity of a managed object, used as map key for locks,
/// listeners and request scratch slots.
pub(crate) fn object_key(object: &Arc<dyn ManagedObject>) -> usize {
    Arc::as_ptr(object) as *const () as usize
}
