//! Primary/standby role classification for the probed node.
//!
//! Classifies a live session by recovery state, counts active replica
//! connections and derives the peer node's identity. Role information is
//! derived fresh on every call: a failover can change it between any two
//! operations.

use std::fmt;

use tracing::debug;

use crate::session::{ProbeSession, SessionError};

/// Character bound for the error tag carried in an `Unknown` role.
const ERROR_TAG_LEN: usize = 32;

/// Node role as seen through one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Primary,
    Standby,
    Unknown,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Standby => write!(f, "standby"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The partner node of the one we are connected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    /// No replica is connected
    Absent,
    /// Observed or inferred peer address
    Known(String),
    /// Could not be determined
    Unknown,
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "none"),
            Self::Known(addr) => write!(f, "{addr}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Replication snapshot for one node, derived per operation.
#[derive(Debug, Clone)]
pub struct NodeRoleInfo {
    pub role: NodeRole,
    /// Truncated error tag when inspection itself failed
    pub error: Option<String>,
    pub peer: Peer,
    /// Active replica connections; -1 means inspection failed
    pub peer_count: i64,
    pub sync_state: Option<String>,
}

impl NodeRoleInfo {
    /// Info for a failed inspection. Distinguished from "zero replicas" by
    /// the -1 peer count sentinel.
    pub fn failed(reason: &str) -> Self {
        Self {
            role: NodeRole::Unknown,
            error: Some(error_tag(reason)),
            peer: Peer::Unknown,
            peer_count: -1,
            sync_state: None,
        }
    }

    /// Role description for logs and the final report.
    pub fn role_desc(&self) -> String {
        match &self.error {
            Some(tag) => format!("unknown({tag})"),
            None => self.role.to_string(),
        }
    }

    pub fn sync_desc(&self) -> &str {
        self.sync_state.as_deref().unwrap_or("none")
    }
}

/// Statically configured physical node addresses of the cluster.
#[derive(Debug, Clone, Default)]
pub struct ClusterNodes(Vec<String>);

impl ClusterNodes {
    pub fn new(nodes: Vec<String>) -> Self {
        Self(nodes)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn addresses(&self) -> &[String] {
        &self.0
    }

    /// Infer the partner of `observed` by elimination over the configured
    /// set. Unique for two-node sets; for larger sets the first non-matching
    /// entry wins, which is a documented limitation of this inference.
    pub fn partner_of(&self, observed: &str) -> Option<String> {
        if !self.0.iter().any(|n| n == observed) {
            return None;
        }
        self.0.iter().find(|n| n.as_str() != observed).cloned()
    }
}

/// Classifies node role and derives peer identity from a live session.
pub struct Inspector {
    cluster: ClusterNodes,
}

impl Inspector {
    pub fn new(cluster: ClusterNodes) -> Self {
        Self { cluster }
    }

    /// Inspect the node behind `session`.
    ///
    /// Never fails past this boundary: a query error degrades to an
    /// `Unknown` role carrying a truncated tag, so the main operation can
    /// still be attempted and reported.
    pub async fn inspect<S: ProbeSession + ?Sized>(&self, session: &S) -> NodeRoleInfo {
        match self.inspect_inner(session).await {
            Ok(info) => info,
            Err(err) => {
                debug!(error = %err, "role inspection failed");
                NodeRoleInfo::failed(&err.to_string())
            }
        }
    }

    async fn inspect_inner<S: ProbeSession + ?Sized>(
        &self,
        session: &S,
    ) -> Result<NodeRoleInfo, SessionError> {
        let in_recovery = session.recovery_state().await?;
        let role = if in_recovery {
            NodeRole::Standby
        } else {
            NodeRole::Primary
        };

        let peer_count = session.replica_count().await?;

        let mut replica_addr = None;
        let mut sync_state = None;
        if peer_count > 0 {
            // First row wins; ordering of multiple replicas is not meaningful.
            if let Some(detail) = session.replica_detail().await? {
                replica_addr = detail.addr;
                sync_state = detail.state;
            }
        }

        let peer = match role {
            // The primary observes its standby directly.
            NodeRole::Primary => match &replica_addr {
                Some(addr) => Peer::Known(addr.clone()),
                None => Peer::Absent,
            },
            // A standby's own identity is not the peer: the primary is
            // inferred by eliminating the observed address from the
            // configured node set.
            NodeRole::Standby => {
                let observed = match session.server_addr().await {
                    Ok(Some(addr)) => Some(addr),
                    _ => replica_addr.clone(),
                };
                match observed.and_then(|addr| self.cluster.partner_of(&addr)) {
                    Some(partner) => Peer::Known(partner),
                    None => Peer::Unknown,
                }
            }
            NodeRole::Unknown => Peer::Unknown,
        };

        Ok(NodeRoleInfo {
            role,
            error: None,
            peer,
            peer_count,
            sync_state,
        })
    }
}

/// Compact single-token tag from an error message.
fn error_tag(msg: &str) -> String {
    msg.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(ERROR_TAG_LEN)
        .collect()
}
