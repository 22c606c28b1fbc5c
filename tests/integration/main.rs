//! Integration test entry point
//!
//! Run with: HAPROBE_RUN_INTEGRATION_TESTS=1 cargo test --test integration
//!
//! These tests need a reachable PostgreSQL-compatible node, configured
//! through the same HAPROBE_* environment variables the probe binary uses
//! (HAPROBE_HOST, HAPROBE_PORT, HAPROBE_USER, HAPROBE_PWD, HAPROBE_DB,
//! HAPROBE_CLUSTER_NODES).

mod live;

use std::env;

/// Check if integration tests should run
pub fn should_run_integration_tests() -> bool {
    env::var("HAPROBE_RUN_INTEGRATION_TESTS")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Skip test if integration tests are not enabled
#[macro_export]
macro_rules! skip_if_not_enabled {
    () => {
        if !crate::should_run_integration_tests() {
            eprintln!(
                "Skipping integration test (set HAPROBE_RUN_INTEGRATION_TESTS=1 to run)"
            );
            return;
        }
    };
}
