//! # async-snmp-agent
//!
//! Request-processing core of an SNMP command responder.
//!
//! ## Features
//!
//! - Context-partitioned registry of managed objects with ordered,
//!   near-linear successor search
//! - Per-object locking with reentrant owners and timed acquisition
//! - GET, GETNEXT, GETBULK and SET handlers with atomic four-phase SET
//! - Ready-made [`Scalar`](mib::Scalar) and [`Table`](mib::Table) objects,
//!   with row creation and row-level listeners
//! - View-based access control (RFC 3415) and community coexistence
//!   (RFC 3584)
//!
//! Message encoding, security processing and sockets are left to the
//! messaging layer, which feeds decoded [`RequestEvent`](transport::RequestEvent)s
//! in and takes [`ResponseEvent`](transport::ResponseEvent)s back.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_snmp_agent::agent::Agent;
//! use async_snmp_agent::mib::Scalar;
//! use async_snmp_agent::pdu::Pdu;
//! use async_snmp_agent::transport::{RequestEvent, StateReference};
//! use async_snmp_agent::{Value, Version, oid};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> async_snmp_agent::Result<()> {
//!     let agent = Agent::builder().community("public", "public", "").build()?;
//!     agent.register(
//!         Arc::new(Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("edge router"))),
//!         None,
//!     )?;
//!
//!     let request = RequestEvent::community(
//!         "192.0.2.10:50000".parse().unwrap(),
//!         Version::V2c,
//!         "public",
//!         Pdu::get_next_request(1, &[oid!(1, 3, 6, 1, 2, 1, 1)]),
//!         StateReference(1),
//!     );
//!     let response = agent.process(request).await.unwrap();
//!     assert_eq!(response.pdu.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod error;
pub mod handler;
pub mod mib;
pub mod oid;
pub mod pdu;
pub mod query;
pub mod registry;
pub mod scope;
pub mod transport;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

// Re-exports for convenience
pub use agent::{Agent, AgentBuilder, AgentConfig, VacmBuilder, VacmConfig, View};
pub use error::{Error, ErrorStatus, OidErrorKind, Result};
pub use handler::{
    BoxFuture, ManagedObject, Persistable, RequestContext, SecurityLevel, SecurityModel,
    SubRequest, Transactional,
};
pub use oid::Oid;
pub use pdu::{Pdu, PduType};
pub use query::{AccessControl, AccessKind, Query};
pub use registry::Registry;
pub use scope::{ContextRegion, Region};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
