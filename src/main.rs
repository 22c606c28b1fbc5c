use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use haprobe::config::{Config, ProbeMode};
use haprobe::connect::Connector;
use haprobe::inspect::{ClusterNodes, Inspector};
use haprobe::probe::{ProbeLoop, Timing};
use haprobe::session::{PgSessionFactory, SessionFactory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let mode = match ProbeMode::from_arg(std::env::args().nth(1).as_deref()) {
        Ok(mode) => mode,
        Err(reason) => {
            error!(reason = %reason, "invalid arguments");
            std::process::exit(2);
        }
    };

    let config = Config::from_env();
    info!(
        mode = %mode,
        endpoint = %config.endpoint(),
        database = %config.database,
        cluster_nodes = ?config.cluster_nodes,
        normal_interval_ms = config.normal_interval.as_millis() as u64,
        retry_interval_ms = config.retry_interval.as_millis() as u64,
        op_timeout_ms = config.op_timeout.as_millis() as u64,
        connect_attempts = config.connect_attempts,
        "availability probe starting"
    );

    let factory = PgSessionFactory::new(&config, mode);

    // Pre-flight for the write probe: a stale or missing table would corrupt
    // the measurement baseline, so failure here aborts the whole run.
    if mode == ProbeMode::Write {
        let session = factory
            .open()
            .await
            .context("failed to connect for table preparation")?;
        session
            .prepare_probe_table()
            .await
            .context("failed to prepare probe table")?;
        info!("probe table prepared");
    }

    let inspector = Inspector::new(ClusterNodes::new(config.cluster_nodes.clone()));
    let connector = Connector::new(factory, mode, config.connect_attempts);
    let probe = ProbeLoop::new(mode, connector, inspector, Timing::from(&config));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("termination signal received");
            signal_token.cancel();
        }
    });

    info!("probe running (Ctrl+C to stop)");
    let report = probe.run(shutdown).await;

    println!("\n{report}");
    Ok(())
}
