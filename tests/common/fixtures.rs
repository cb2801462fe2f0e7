//! Standard test fixtures with realistic MIB data.

use std::sync::Arc;

use async_snmp_agent::agent::{Agent, AgentBuilder};
use async_snmp_agent::mib::{Column, ColumnAccess, Scalar, Table};
use async_snmp_agent::value::ValueKind;
use async_snmp_agent::{Oid, Value, oid};

/// V2c read-only community
pub const COMMUNITY_RO: &[u8] = b"public";
/// V2c read-write community
pub const COMMUNITY_RW: &[u8] = b"private";

// =============================================================================
// Managed objects
// =============================================================================

/// Standard system MIB scalars (1.3.6.1.2.1.1).
///
/// sysContact, sysName and sysLocation are writable.
pub fn system_scalars() -> Vec<Arc<Scalar>> {
    vec![
        Arc::new(Scalar::read_only(sys_descr(), Value::from("Test SNMP Agent"))),
        Arc::new(Scalar::read_only(
            sys_object_id(),
            Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 99999)),
        )),
        Arc::new(Scalar::read_only(sys_uptime(), Value::TimeTicks(123456))),
        Arc::new(Scalar::read_write(sys_contact(), Value::from("admin@test.local"))),
        Arc::new(Scalar::read_write(sys_name(), Value::from("test-agent"))),
        Arc::new(Scalar::read_write(sys_location(), Value::from("Test Lab"))),
        Arc::new(Scalar::read_only(sys_services(), Value::Integer(72))),
    ]
}

/// ifTable with two rows and three readable columns: ifIndex, ifDescr and
/// the writable ifAdminStatus.
pub fn if_table() -> Arc<Table> {
    let table = Table::builder(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1))
        .column(Column::new(1, ColumnAccess::ReadOnly, ValueKind::Integer))
        .column(Column::new(2, ColumnAccess::ReadOnly, ValueKind::OctetString))
        .column(Column::new(7, ColumnAccess::ReadWrite, ValueKind::Integer))
        .build()
        .expect("valid ifTable");
    for i in 1..=2u32 {
        table
            .add_row(
                oid!(i),
                vec![
                    Value::Integer(i as i32),
                    Value::from(format!("eth{}", i - 1)),
                    Value::Integer(1),
                ],
            )
            .expect("fresh row");
    }
    Arc::new(table)
}

/// Enterprise table with creatable rows, under 1.3.6.1.4.1.99999.1.1.
///
/// Columns: 1 index (not-accessible), 2 name, 3 level, 4 status (defaults
/// to 1). Row 1 exists.
pub fn config_table() -> Arc<Table> {
    let table = Table::builder(oid!(1, 3, 6, 1, 4, 1, 99999, 1, 1))
        .column(Column::new(1, ColumnAccess::NotAccessible, ValueKind::Integer))
        .column(Column::new(2, ColumnAccess::ReadCreate, ValueKind::OctetString))
        .column(Column::new(3, ColumnAccess::ReadCreate, ValueKind::Integer))
        .column(
            Column::new(4, ColumnAccess::ReadCreate, ValueKind::Integer)
                .with_default(Value::Integer(1)),
        )
        .build()
        .expect("valid config table");
    table
        .add_row(
            oid!(1),
            vec![Value::Integer(1), Value::from("alpha"), Value::Integer(10), Value::Integer(1)],
        )
        .expect("fresh row");
    Arc::new(table)
}

// =============================================================================
// Preloaded agent
// =============================================================================

/// An agent serving the default context with every fixture registered
/// universally, plus handles to the objects for inspection.
pub struct Fixtures {
    pub agent: Agent,
    pub scalars: Vec<Arc<Scalar>>,
    pub if_table: Arc<Table>,
    pub config_table: Arc<Table>,
}

impl Fixtures {
    pub fn new() -> Self {
        Self::with_builder(Agent::builder())
    }

    /// Add the `public` and `private` communities to `builder`, build it and
    /// register the fixtures.
    pub fn with_builder(builder: AgentBuilder) -> Self {
        let agent = builder
            .community(COMMUNITY_RO, "public", "")
            .community(COMMUNITY_RW, "private", "")
            .build()
            .expect("failed to build test agent");

        let scalars = system_scalars();
        for scalar in &scalars {
            agent.register(scalar.clone(), None).expect("register scalar");
        }
        let if_table = if_table();
        agent.register(if_table.clone(), None).expect("register ifTable");
        let config_table = config_table();
        agent.register(config_table.clone(), None).expect("register config table");

        Self {
            agent,
            scalars,
            if_table,
            config_table,
        }
    }

    pub fn scalar(&self, oid: &Oid) -> &Arc<Scalar> {
        self.scalars
            .iter()
            .find(|s| s.oid() == oid)
            .expect("no such fixture scalar")
    }
}

// =============================================================================
// OID helper functions
// =============================================================================

/// sysDescr.0
pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

/// sysObjectID.0
pub fn sys_object_id() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)
}

/// sysUpTime.0
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}

/// sysContact.0
pub fn sys_contact() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 4, 0)
}

/// sysName.0
pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}

/// sysLocation.0
pub fn sys_location() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)
}

/// sysServices.0
pub fn sys_services() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 7, 0)
}

/// System subtree root: 1.3.6.1.2.1.1
pub fn system_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1)
}

/// Nonexistent OID for testing NoSuchObject
pub fn nonexistent_oid() -> Oid {
    oid!(1, 3, 6, 1, 99, 99, 99, 0)
}
