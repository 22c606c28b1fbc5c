//! Top-level probe loop: a small state machine alternating between "ensure
//! connected" and "perform one bounded operation".
//!
//! One logical task drives the loop; operation N is fully resolved before
//! operation N+1 starts. Cancellation is observed between iterations and at
//! the top of every sleep — never mid-operation, which is already capped by
//! the executor's own timeout.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, ProbeMode};
use crate::connect::Connector;
use crate::executor::{self, ProbeOp};
use crate::inspect::Inspector;
use crate::session::{ProbeSession, SessionFactory};
use crate::stats::{ProbeReport, Stats};

/// Probe loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No usable session; the next step is a connect cycle
    Disconnected,
    /// A session is held and believed usable
    ConnectedIdle,
    /// One bounded operation is in flight
    Operating,
    /// Shut down by operator cancellation
    Terminated,
}

/// Sleep intervals and the per-operation budget.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Sleep between successful operations
    pub normal_interval: Duration,
    /// Sleep after any failed cycle
    pub retry_interval: Duration,
    /// Wall-clock budget for one operation
    pub op_timeout: Duration,
}

impl From<&Config> for Timing {
    fn from(config: &Config) -> Self {
        Self {
            normal_interval: config.normal_interval,
            retry_interval: config.retry_interval,
            op_timeout: config.op_timeout,
        }
    }
}

/// The long-running availability probe.
pub struct ProbeLoop<F: SessionFactory> {
    mode: ProbeMode,
    connector: Connector<F>,
    inspector: Inspector,
    timing: Timing,
    stats: Stats,
    state: LoopState,
    session: Option<F::Session>,
    /// Set after the first successful connect of the process lifetime
    connected_once: bool,
    next_seq: i64,
    last_node: String,
}

impl<F: SessionFactory> ProbeLoop<F> {
    pub fn new(mode: ProbeMode, connector: Connector<F>, inspector: Inspector, timing: Timing) -> Self {
        Self {
            mode,
            connector,
            inspector,
            timing,
            stats: Stats::new(),
            state: LoopState::Disconnected,
            session: None,
            connected_once: false,
            next_seq: 1,
            last_node: "unknown".to_string(),
        }
    }

    /// Drive the loop until `shutdown` fires, then produce the final report.
    pub async fn run(mut self, shutdown: CancellationToken) -> ProbeReport {
        while !shutdown.is_cancelled() {
            match self.state {
                LoopState::Disconnected => {
                    let is_first = !self.connected_once;
                    match self.connector.connect(is_first, &mut self.stats).await {
                        Some(session) => {
                            self.connected_once = true;
                            self.session = Some(session);
                            self.state = LoopState::ConnectedIdle;
                        }
                        None => {
                            // The whole cycle failed; account for it so the
                            // counters stay consistent per iteration.
                            self.stats.record_failure();
                            warn!(
                                retry_in_ms = self.timing.retry_interval.as_millis() as u64,
                                "endpoint unavailable"
                            );
                            if !self.sleep(self.timing.retry_interval, &shutdown).await {
                                break;
                            }
                        }
                    }
                }
                LoopState::ConnectedIdle => {
                    // Cheap liveness probe before operating: only a real
                    // failure forces a full reconnect, which avoids
                    // reconnect storms on transient blips.
                    let alive = match &self.session {
                        Some(session) => session.is_open() && session.ping().await.is_ok(),
                        None => false,
                    };
                    if alive {
                        self.state = LoopState::Operating;
                    } else {
                        if let Some(mut session) = self.session.take() {
                            session.close();
                        }
                        info!("session lost, reconnecting");
                        self.state = LoopState::Disconnected;
                    }
                }
                LoopState::Operating => {
                    let op = match self.mode {
                        ProbeMode::Write => ProbeOp::Write { seq: self.next_seq },
                        ProbeMode::Read => ProbeOp::Read,
                    };
                    let Some(session) = self.session.as_mut() else {
                        self.state = LoopState::Disconnected;
                        continue;
                    };

                    let result =
                        executor::execute(session, &self.inspector, op, self.timing.op_timeout)
                            .await;
                    self.last_node = result.role_info.role_desc();

                    if result.success {
                        self.stats.record_success();
                        info!(
                            op = %result.detail,
                            role = %result.role_info.role_desc(),
                            peer = %result.role_info.peer,
                            sync = result.role_info.sync_desc(),
                            elapsed_ms = result.elapsed.as_millis() as u64,
                            "probe ok"
                        );
                        if self.mode == ProbeMode::Write {
                            self.next_seq += 1;
                        }
                        self.state = LoopState::ConnectedIdle;
                        if !self.sleep(self.timing.normal_interval, &shutdown).await {
                            break;
                        }
                    } else {
                        self.stats.record_failure();
                        warn!(
                            reason = %result.detail,
                            role = %result.role_info.role_desc(),
                            "probe failed"
                        );
                        if result.session_invalidated {
                            // Executor already closed it; drop the handle so
                            // it can never reach another operation.
                            self.session = None;
                            self.state = LoopState::Disconnected;
                        } else {
                            self.state = LoopState::ConnectedIdle;
                        }
                        if !self.sleep(self.timing.retry_interval, &shutdown).await {
                            break;
                        }
                    }

                    debug_assert_eq!(
                        self.stats.total_ops,
                        self.stats.success_ops + self.stats.failed_ops
                    );
                }
                LoopState::Terminated => break,
            }
        }

        self.state = LoopState::Terminated;
        if let Some(mut session) = self.session.take() {
            session.close();
        }

        let elapsed = self.stats.started_at.elapsed();
        ProbeReport {
            mode: self.mode,
            stats: self.stats,
            elapsed,
            last_node: self.last_node,
        }
    }

    /// Cancellable sleep; false means shutdown fired.
    async fn sleep(&self, duration: Duration, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
