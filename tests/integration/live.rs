//! Live-node checks: one full write cycle and a role inspection against a
//! real cluster node.

use std::time::Duration;

use haprobe::config::{Config, ProbeMode};
use haprobe::connect::Connector;
use haprobe::executor::{self, ProbeOp};
use haprobe::inspect::{ClusterNodes, Inspector, NodeRole};
use haprobe::session::{PgSessionFactory, ProbeSession, SessionFactory};
use haprobe::stats::Stats;

use crate::skip_if_not_enabled;

#[tokio::test]
async fn test_write_cycle_round_trip() {
    skip_if_not_enabled!();

    let config = Config::from_env();
    let factory = PgSessionFactory::new(&config, ProbeMode::Write);

    let session = factory.open().await.expect("open session");
    session.prepare_probe_table().await.expect("prepare table");

    let inspector = Inspector::new(ClusterNodes::new(config.cluster_nodes.clone()));
    let mut session = factory.open().await.expect("open probe session");

    let result = executor::execute(
        &mut session,
        &inspector,
        ProbeOp::Write { seq: 1 },
        Duration::from_secs(5),
    )
    .await;
    assert!(result.success, "write failed: {}", result.detail);
    assert_eq!(result.role_info.role, NodeRole::Primary);

    let latest = session.read_latest_seq().await.expect("read latest");
    assert_eq!(latest, Some(1));
}

#[tokio::test]
async fn test_inspector_classifies_live_node() {
    skip_if_not_enabled!();

    let config = Config::from_env();
    let factory = PgSessionFactory::new(&config, ProbeMode::Read);
    let session = factory.open().await.expect("open session");

    let inspector = Inspector::new(ClusterNodes::new(config.cluster_nodes.clone()));
    let info = inspector.inspect(&session).await;

    assert_ne!(info.role, NodeRole::Unknown, "error: {:?}", info.error);
    assert!(info.peer_count >= 0);
}

#[tokio::test]
async fn test_connector_lands_on_primary_for_writes() {
    skip_if_not_enabled!();

    let config = Config::from_env();
    let factory = PgSessionFactory::new(&config, ProbeMode::Write);
    let connector = Connector::new(factory, ProbeMode::Write, config.connect_attempts);
    let mut stats = Stats::new();

    let session = connector
        .connect(true, &mut stats)
        .await
        .expect("endpoint unavailable");
    assert!(session.is_open());
    assert!(!session.recovery_state().await.expect("recovery state"));
    assert_eq!(stats.reconnects, 0);
}
