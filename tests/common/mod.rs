//! Shared test infrastructure for async-snmp-agent.
//!
//! Provides fixtures (system scalars, an interface table, a creatable
//! table), request builders and an agent preloaded with both.

// Allow dead code and unused imports since not all test files use all utilities
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fixtures;
pub mod requests;

pub use fixtures::{
    COMMUNITY_RO, COMMUNITY_RW, Fixtures, config_table, if_table, nonexistent_oid, sys_contact,
    sys_descr, sys_location, sys_name, sys_object_id, sys_services, sys_uptime, system_scalars,
    system_subtree,
};
pub use requests::{source, v1, v2c, v2c_rw, v3};

use std::sync::Once;

/// Install a test-writer subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
