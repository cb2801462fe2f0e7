//! Per-request state: the request arena and its sub-requests.
//!
//! The dispatcher creates one [`Request`] when it admits a PDU and drops it
//! when the response has been assembled. Everything a managed object needs
//! to remember for the duration of a request (walk caches, pending row
//! changes) lives in the request's [`RequestScratch`], so it is released
//! with the request.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::scope::Region;
use crate::value::Value;
use crate::varbind::VarBind;

use super::RequestContext;

/// Agent-local identifier of an in-flight request. Also the lock owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed scratch storage scoped to one request.
///
/// Slots are keyed by an owner (usually the address of the managed object)
/// and the stored type.
#[derive(Default)]
pub struct RequestScratch {
    slots: Mutex<HashMap<(usize, TypeId), Box<dyn Any + Send>>>,
}

impl RequestScratch {
    /// Run `f` on the slot for `(owner, T)`, creating it with `T::default()`.
    pub fn with<T, R>(&self, owner: usize, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Default + Send + 'static,
    {
        let mut slots = self.slots.lock();
        let slot = slots
            .entry((owner, TypeId::of::<T>()))
            .or_insert_with(|| Box::new(T::default()));
        match slot.downcast_mut::<T>() {
            Some(value) => f(value),
            // The key includes the TypeId, so the downcast cannot fail.
            None => f(&mut T::default()),
        }
    }

    /// Remove and return the slot for `(owner, T)`.
    pub fn take<T: Send + 'static>(&self, owner: usize) -> Option<T> {
        self.slots
            .lock()
            .remove(&(owner, TypeId::of::<T>()))
            .and_then(|slot| slot.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl fmt::Debug for RequestScratch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScratch")
            .field("slots", &self.len())
            .finish()
    }
}

/// A request being processed.
#[derive(Debug)]
pub struct Request {
    id: RequestId,
    context: RequestContext,
    oids: Vec<Oid>,
    max_size: usize,
    scratch: RequestScratch,
}

impl Request {
    pub fn new(id: RequestId, context: RequestContext, oids: Vec<Oid>, max_size: usize) -> Self {
        Self {
            id,
            context,
            oids,
            max_size,
            scratch: RequestScratch::default(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Context partition of the request.
    pub fn context_name(&self) -> &Bytes {
        &self.context.context_name
    }

    /// Names of the request's varbinds, in PDU order.
    pub fn oids(&self) -> &[Oid] {
        &self.oids
    }

    /// Maximum response size negotiated for this request.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn scratch(&self) -> &RequestScratch {
        &self.scratch
    }
}

/// The SET phase a sub-request reached last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetPhase {
    Prepare,
    Commit,
    Undo,
    Cleanup,
}

/// One addressed instance of a request.
///
/// Handlers and managed objects record outcomes here instead of returning
/// errors: a value, an exception value, or an [`ErrorStatus`].
pub struct SubRequest {
    index: usize,
    varbind: VarBind,
    scope: Region,
    view: Option<Bytes>,
    status: ErrorStatus,
    error_index: Option<usize>,
    phase: Option<SetPhase>,
    complete: bool,
    undo_value: Option<Value>,
    request: Arc<Request>,
}

impl SubRequest {
    /// Sub-request for `varbind` at 0-based position `index`.
    ///
    /// The cursor scope starts as the single instance named by the varbind.
    pub fn new(request: Arc<Request>, index: usize, varbind: VarBind) -> Self {
        let scope = Region::instance(&varbind.oid);
        Self {
            index,
            varbind,
            scope,
            view: None,
            status: ErrorStatus::NoError,
            error_index: None,
            phase: None,
            complete: false,
            undo_value: None,
            request,
        }
    }

    /// 0-based position in the PDU.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn oid(&self) -> &Oid {
        &self.varbind.oid
    }

    /// The value: the requested value for SET, the answer for reads.
    pub fn value(&self) -> &Value {
        &self.varbind.value
    }

    pub fn varbind(&self) -> &VarBind {
        &self.varbind
    }

    pub fn into_varbind(self) -> VarBind {
        self.varbind
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// The cursor used by successor search.
    pub fn scope(&self) -> &Region {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Region {
        &mut self.scope
    }

    pub fn set_scope(&mut self, scope: Region) {
        self.scope = scope;
    }

    /// View name resolved for this instance, if access control is active.
    pub fn view(&self) -> Option<&Bytes> {
        self.view.as_ref()
    }

    pub fn set_view(&mut self, view: Option<Bytes>) {
        self.view = view;
    }

    /// Answer the sub-request with a value and mark it complete.
    pub fn respond(&mut self, oid: Oid, value: Value) {
        self.varbind = VarBind::new(oid, value);
        self.complete = true;
    }

    /// Set the value without changing the OID.
    pub fn set_value(&mut self, value: Value) {
        self.varbind.value = value;
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    pub fn has_error(&self) -> bool {
        self.status.is_error()
    }

    /// Record a failure. The first failure wins.
    pub fn fail(&mut self, status: ErrorStatus) {
        if !self.status.is_error() {
            self.status = status;
        }
        self.complete = true;
    }

    /// Record a failure reported against another varbind position (0-based),
    /// or against no position at all.
    pub fn fail_at(&mut self, status: ErrorStatus, error_index: Option<usize>) {
        if !self.status.is_error() {
            self.status = status;
            self.error_index = Some(error_index.map_or(0, |i| i + 1));
        }
        self.complete = true;
    }

    /// Overwrite the status, e.g. with `undoFailed` after a failed rollback.
    /// `error_index` follows [`fail_at`](Self::fail_at).
    pub fn replace_status(&mut self, status: ErrorStatus, error_index: Option<usize>) {
        self.status = status;
        self.error_index = Some(error_index.map_or(0, |i| i + 1));
    }

    /// 1-based error index reported in the response (0 = no specific varbind).
    pub fn error_index(&self) -> usize {
        self.error_index.unwrap_or(self.index + 1)
    }

    pub fn phase(&self) -> Option<SetPhase> {
        self.phase
    }

    pub fn set_phase(&mut self, phase: SetPhase) {
        self.phase = Some(phase);
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
    }

    /// Value captured at commit for rollback.
    pub fn undo_value(&self) -> Option<&Value> {
        self.undo_value.as_ref()
    }

    pub fn set_undo_value(&mut self, value: Option<Value>) {
        self.undo_value = value;
    }

    pub fn take_undo_value(&mut self) -> Option<Value> {
        self.undo_value.take()
    }
}

impl fmt::Debug for SubRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubRequest")
            .field("request", &self.request.id())
            .field("index", &self.index)
            .field("varbind", &self.varbind)
            .field("scope", &self.scope)
            .field("status", &self.status)
            .field("phase", &self.phase)
            .field("complete", &self.complete)
            .finish()
    }
}
