//! Connection establishment against the floating endpoint.
//!
//! Each connect cycle gets a bounded number of attempts. An attempt opens a
//! session, verifies liveness, and for the write probe confirms the session
//! landed on the primary (the floating address can still point at a demoted
//! node for a moment during failover).

use std::time::Duration;

use tracing::{info, warn};

use crate::config::ProbeMode;
use crate::inspect::NodeRole;
use crate::session::{ProbeSession, SessionError, SessionFactory};
use crate::stats::Stats;

/// Delay between attempts inside one connect cycle. Decoupled from the
/// loop-level retry interval: this only paces a not-yet-ready endpoint.
pub const ATTEMPT_DELAY: Duration = Duration::from_millis(500);

/// Failure of a single connect attempt.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("node {0} is a standby, writes require the primary")]
    NotPrimary(String),
}

/// Opens validated sessions with bounded retries and reconnect accounting.
pub struct Connector<F: SessionFactory> {
    factory: F,
    mode: ProbeMode,
    attempts: u32,
    attempt_delay: Duration,
}

impl<F: SessionFactory> Connector<F> {
    pub fn new(factory: F, mode: ProbeMode, attempts: u32) -> Self {
        Self {
            factory,
            mode,
            attempts: attempts.max(1),
            attempt_delay: ATTEMPT_DELAY,
        }
    }

    #[cfg(test)]
    fn with_attempt_delay(mut self, delay: Duration) -> Self {
        self.attempt_delay = delay;
        self
    }

    /// Try to open a validated session, up to the attempt budget.
    ///
    /// Returns `None` when the endpoint is unavailable; backing off by the
    /// retry interval is the caller's responsibility. The reconnect counter
    /// is bumped on success unless this is the first-ever connection.
    pub async fn connect(&self, is_first_attempt: bool, stats: &mut Stats) -> Option<F::Session> {
        for attempt in 1..=self.attempts {
            match self.try_once().await {
                Ok((session, node_addr, role)) => {
                    if is_first_attempt {
                        info!(node = %node_addr, role = %role, "first connection established");
                    } else {
                        stats.record_reconnect();
                        info!(node = %node_addr, role = %role, "reconnected");
                    }
                    return Some(session);
                }
                Err(err) => {
                    warn!(
                        attempt,
                        max_attempts = self.attempts,
                        error = %err,
                        "connect attempt failed"
                    );
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.attempt_delay).await;
            }
        }
        None
    }

    async fn try_once(&self) -> Result<(F::Session, String, NodeRole), AttemptError> {
        let mut session = self.factory.open().await?;

        // Liveness first: an accepted transport can still be a dead backend.
        session.ping().await?;

        let role = match session.recovery_state().await {
            Ok(true) => NodeRole::Standby,
            Ok(false) => NodeRole::Primary,
            // The read probe accepts any reachable node, so a failed role
            // query is tolerated there; the write probe must be sure.
            Err(err) => {
                if self.mode == ProbeMode::Write {
                    return Err(err.into());
                }
                NodeRole::Unknown
            }
        };

        let node_addr = match session.server_addr().await {
            Ok(Some(addr)) => addr,
            _ => session.endpoint().to_string(),
        };

        if self.mode == ProbeMode::Write && role == NodeRole::Standby {
            session.close();
            return Err(AttemptError::NotPrimary(node_addr));
        }

        Ok((session, node_addr, role))
    }
}
