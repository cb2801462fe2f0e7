//! Ready-made managed objects.
//!
//! - [`Scalar`] - one instance at a fixed OID
//! - [`Table`] - conceptual rows under an entry OID, with row creation and
//!   row-level listeners
//!
//! Both implement [`ManagedObject`](crate::handler::ManagedObject),
//! [`Transactional`](crate::handler::Transactional) and
//! [`Persistable`](crate::handler::Persistable).

mod scalar;
pub mod table;

pub use scalar::Scalar;
pub use table::{
    CellEvent, Column, ColumnAccess, Row, RowEvent, RowEventKind, RowListener, RowVeto, Table,
    TableBuilder,
};

use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::value::Value;

/// Value constraint checked while preparing a SET.
///
/// Closures with the matching signature implement this trait.
///
/// ```
/// use async_snmp_agent::mib::{Scalar, ValueValidator};
/// use async_snmp_agent::{ErrorStatus, Value, oid};
///
/// let sys_contact = Scalar::read_write(oid!(1, 3, 6, 1, 2, 1, 1, 4, 0), Value::from(""));
/// sys_contact.add_validator(|_oid: &async_snmp_agent::Oid, value: &Value| match value.as_bytes() {
///     Some(b) if b.len() <= 255 => Ok(()),
///     _ => Err(ErrorStatus::WrongLength),
/// });
/// ```
pub trait ValueValidator: Send + Sync {
    fn validate(&self, oid: &Oid, value: &Value) -> Result<(), ErrorStatus>;
}

impl<F> ValueValidator for F
where
    F: Fn(&Oid, &Value) -> Result<(), ErrorStatus> + Send + Sync,
{
    fn validate(&self, oid: &Oid, value: &Value) -> Result<(), ErrorStatus> {
        self(oid, value)
    }
}
