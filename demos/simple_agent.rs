//! Simple SNMP Agent Example
//!
//! Builds an agent with the system group and an interface table, then plays
//! the messaging layer: decoded requests go in over a channel and responses
//! come back through a [`ChannelSink`].
//!
//! Run with: cargo run --example simple_agent
//!
//! Set `RUST_LOG=async_snmp_agent=debug` to watch the dispatcher.

use std::sync::Arc;

use async_snmp_agent::agent::Agent;
use async_snmp_agent::mib::{Column, ColumnAccess, RowEvent, RowListener, Scalar, Table};
use async_snmp_agent::pdu::Pdu;
use async_snmp_agent::transport::{ChannelSink, RequestEvent, StateReference};
use async_snmp_agent::value::ValueKind;
use async_snmp_agent::{Value, VarBind, Version, oid};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Logs every committed row change.
struct AuditLog;

impl RowListener for AuditLog {
    fn row_committed(&self, event: &RowEvent<'_>) {
        tracing::info!(row = %event.index, kind = ?event.kind, "ifTable row committed");
    }
}

fn system_group() -> Vec<Scalar> {
    vec![
        Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("async-snmp-agent example")),
        Scalar::read_only(
            oid!(1, 3, 6, 1, 2, 1, 1, 2, 0),
            Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 99999)),
        ),
        Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(12345)),
        Scalar::read_write(oid!(1, 3, 6, 1, 2, 1, 1, 4, 0), Value::from("admin@example.com")),
        Scalar::read_write(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("example-host")),
        Scalar::read_write(oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), Value::from("Server Room")),
        Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 7, 0), Value::Integer(72)),
    ]
}

fn if_table() -> async_snmp_agent::Result<Table> {
    let table = Table::builder(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1))
        .column(Column::new(1, ColumnAccess::ReadOnly, ValueKind::Integer))
        .column(Column::new(2, ColumnAccess::ReadOnly, ValueKind::OctetString))
        .column(Column::new(7, ColumnAccess::ReadWrite, ValueKind::Integer))
        .build()?;
    for (i, name) in ["lo", "eth0", "eth1"].into_iter().enumerate() {
        let index = i as u32 + 1;
        table.add_row(
            oid!(index),
            vec![Value::Integer(index as i32), Value::from(name), Value::Integer(1)],
        )?;
    }
    table.add_listener(Arc::new(AuditLog));
    Ok(table)
}

/// ifAdminStatus of interface `index`.
fn if_admin_status(index: u32) -> async_snmp_agent::Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 7, index)
}

fn request(id: i32, community: &'static str, pdu: Pdu) -> RequestEvent {
    RequestEvent::community(
        "127.0.0.1:50161".parse().expect("valid address"),
        Version::V2c,
        community,
        pdu,
        StateReference(id as u64),
    )
}

#[tokio::main]
async fn main() -> async_snmp_agent::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("async_snmp_agent=info".parse().expect("valid directive")),
        )
        .init();

    let agent = Agent::builder()
        .community("public", "public", "")
        .community("private", "private", "")
        .vacm(|v| {
            v.group("public", async_snmp_agent::SecurityModel::V2c, "readers")
                .group("private", async_snmp_agent::SecurityModel::V2c, "admins")
                .access("readers", |a| a.read_view("all"))
                .access("admins", |a| a.read_view("all").write_view("all"))
                .view("all", |view| view.include(oid!(1, 3, 6, 1)))
        })
        .build()?;

    for scalar in system_group() {
        agent.register(Arc::new(scalar), None)?;
    }
    agent.register(Arc::new(if_table()?), None)?;

    let (tx, rx) = mpsc::channel(16);
    let (sink, mut responses) = ChannelSink::channel(16);
    let runner = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.run(rx, Arc::new(sink)).await })
    };

    let script = vec![
        request(
            1,
            "public",
            Pdu::get_request(
                1,
                &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)],
            ),
        ),
        request(2, "public", Pdu::get_next_request(2, &[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)])),
        request(3, "public", Pdu::get_bulk(3, 0, 4, &[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1)])),
        request(
            4,
            "public",
            Pdu::set_request(4, vec![VarBind::new(if_admin_status(2), Value::Integer(2))]),
        ),
        request(
            5,
            "private",
            Pdu::set_request(5, vec![VarBind::new(if_admin_status(2), Value::Integer(2))]),
        ),
    ];
    let expected = script.len();
    for event in script {
        tx.send(event).await.map_err(|_| async_snmp_agent::Error::ChannelClosed.boxed())?;
    }

    for _ in 0..expected {
        let Some(response) = responses.recv().await else {
            break;
        };
        print_response(response.state_ref, &response.pdu);
    }

    agent.cancel().cancel();
    if let Ok(result) = runner.await {
        result?;
    }
    Ok(())
}

fn print_response(state: StateReference, pdu: &Pdu) {
    println!(
        "{} -> {} (status {}, index {})",
        state,
        pdu.pdu_type,
        pdu.error_status_enum(),
        pdu.error_index
    );
    for vb in &pdu.varbinds {
        println!("    {} = {}", vb.oid, vb.value);
    }
}

