//! Bounded execution of a single probe operation.
//!
//! The inspect-then-operate unit runs as a future raced against a deadline.
//! A hung call on a recently-demoted primary must not block the probe: when
//! the budget expires the unit is dropped, its eventual completion discarded,
//! and the session force-closed so the next cycle opens a fresh one (at the
//! cost of possibly leaking one orphaned server-side operation).

use std::time::{Duration, Instant};

use crate::inspect::{Inspector, NodeRoleInfo};
use crate::session::{truncate_error, ProbeSession, MAX_ERROR_LEN};

/// The operation a probe cycle performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOp {
    /// Insert one row with this sequence number
    Write { seq: i64 },
    /// Read the latest row
    Read,
}

/// Outcome of one bounded operation, consumed exactly once by the probe loop.
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub success: bool,
    /// Payload description on success, truncated error message on failure
    pub detail: String,
    pub role_info: NodeRoleInfo,
    pub elapsed: Duration,
    /// The session was closed and must not be reused
    pub session_invalidated: bool,
}

/// Run `op` against `session` within `budget` wall-clock time.
///
/// Always returns within the budget. The inspector runs once per operation
/// so the result carries role context wherever it is still determinable; on
/// timeout the role degrades to unknown.
pub async fn execute<S: ProbeSession>(
    session: &mut S,
    inspector: &Inspector,
    op: ProbeOp,
    budget: Duration,
) -> OperationResult {
    let started = Instant::now();

    let unit = async {
        let role_info = inspector.inspect(&*session).await;
        let outcome = match op {
            ProbeOp::Write { seq } => session.insert_row(seq).await.map(|()| format!("seq {seq}")),
            ProbeOp::Read => session.read_latest_seq().await.map(|latest| match latest {
                Some(seq) => format!("seq {seq}"),
                None => "no rows".to_string(),
            }),
        };
        (role_info, outcome)
    };

    match tokio::time::timeout(budget, unit).await {
        Ok((role_info, Ok(detail))) => OperationResult {
            success: true,
            detail,
            role_info,
            elapsed: started.elapsed(),
            session_invalidated: false,
        },
        Ok((role_info, Err(err))) => {
            let session_invalidated = err.is_connection_error();
            if session_invalidated {
                session.close();
            }
            OperationResult {
                success: false,
                detail: truncate_error(&err.to_string(), MAX_ERROR_LEN),
                role_info,
                elapsed: started.elapsed(),
                session_invalidated,
            }
        }
        Err(_) => {
            // The underlying call may still be running server-side; the
            // session must not be reused either way.
            session.close();
            OperationResult {
                success: false,
                detail: format!(
                    "operation exceeded timeout ({} ms), node may be failing over",
                    budget.as_millis()
                ),
                role_info: NodeRoleInfo::failed("timeout"),
                elapsed: started.elapsed(),
                session_invalidated: true,
            }
        }
    }
}
