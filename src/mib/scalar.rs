use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, ErrorStatus, Result};
use crate::handler::{BoxFuture, ManagedObject, Persistable, SubRequest, Transactional};
use crate::oid::Oid;
use crate::scope::Region;
use crate::value::{Value, ValueKind};
use crate::varbind::VarBind;

use super::ValueValidator;

/// A single instance, such as `sysContact.0`.
///
/// The value's kind is fixed at construction; a SET with another kind fails
/// with `wrongType`.
///
/// ```
/// use async_snmp_agent::mib::Scalar;
/// use async_snmp_agent::{Value, oid};
///
/// let sys_descr = Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("router"));
/// assert_eq!(sys_descr.value(), Value::from("router"));
/// ```
pub struct Scalar {
    oid: Oid,
    kind: ValueKind,
    writable: bool,
    value: RwLock<Value>,
    validators: RwLock<Vec<Arc<dyn ValueValidator>>>,
}

impl Scalar {
    fn new(oid: Oid, value: Value, writable: bool) -> Self {
        Self {
            oid,
            kind: value.kind(),
            writable,
            value: RwLock::new(value),
            validators: RwLock::new(Vec::new()),
        }
    }

    pub fn read_only(oid: Oid, value: Value) -> Self {
        Self::new(oid, value, false)
    }

    pub fn read_write(oid: Oid, value: Value) -> Self {
        Self::new(oid, value, true)
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    pub fn value(&self) -> Value {
        self.value.read().clone()
    }

    /// Replace the value outside of any SET, e.g. from the agent's own
    /// instrumentation.
    pub fn set(&self, value: Value) {
        *self.value.write() = value;
    }

    pub fn add_validator(&self, validator: impl ValueValidator + 'static) {
        self.validators.write().push(Arc::new(validator));
    }

    fn check(&self, sub: &SubRequest) -> std::result::Result<(), ErrorStatus> {
        if !self.writable {
            return Err(ErrorStatus::NotWritable);
        }
        if sub.oid() != &self.oid {
            return Err(ErrorStatus::NoCreation);
        }
        if sub.value().kind() != self.kind {
            return Err(ErrorStatus::WrongType);
        }
        self.validators
            .read()
            .iter()
            .try_for_each(|v| v.validate(sub.oid(), sub.value()))
    }
}

impl ManagedObject for Scalar {
    fn region(&self) -> Region {
        Region::instance(&self.oid)
    }

    fn find<'a>(&'a self, range: &'a Region, _sub: &'a SubRequest) -> BoxFuture<'a, Option<Oid>> {
        let found = range.covers_oid(&self.oid).then(|| self.oid.clone());
        Box::pin(async move { found })
    }

    fn get<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let value = if sub.oid() == &self.oid {
                self.value()
            } else {
                Value::NoSuchInstance
            };
            sub.set_value(value);
        })
    }

    fn as_transactional(&self) -> Option<&dyn Transactional> {
        Some(self)
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
}

impl Transactional for Scalar {
    fn prepare<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Err(status) = self.check(sub) {
                tracing::debug!(target: "async_snmp_agent::mib", { snmp.oid = %self.oid, status = %status }, "scalar rejected value");
                sub.fail(status);
            }
        })
    }

    fn commit<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let previous = std::mem::replace(&mut *self.value.write(), sub.value().clone());
            sub.set_undo_value(Some(previous));
        })
    }

    fn undo<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match sub.take_undo_value() {
                Some(previous) => *self.value.write() = previous,
                None => sub.replace_status(ErrorStatus::UndoFailed, None),
            }
        })
    }

    fn cleanup<'a>(&'a self, _sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

impl Persistable for Scalar {
    fn save(&self) -> Vec<VarBind> {
        vec![VarBind::new(self.oid.clone(), self.value())]
    }

    fn load(&self, varbinds: &[VarBind]) -> Result<()> {
        let Some(vb) = varbinds.iter().find(|vb| vb.oid == self.oid) else {
            return Ok(());
        };
        if vb.value.kind() != self.kind {
            return Err(Error::Config(
                format!("{}: expected {:?}, got {:?}", self.oid, self.kind, vb.value.kind()).into(),
            )
            .boxed());
        }
        self.set(vb.value.clone());
        Ok(())
    }
}
