//! Session abstraction over one live database connection.
//!
//! `ProbeSession` is the seam between the probe state machine and the wire
//! driver: the connection manager, inspector and executor all talk to it, so
//! every failure path can be exercised in tests with a scripted session.

mod pg;

pub use pg::{PgSession, PgSessionFactory};

use async_trait::async_trait;

/// Upper bound for error text carried into results and logs.
pub const MAX_ERROR_LEN: usize = 80;

/// Session state and query errors.
///
/// `Query` is a content-level failure (the statement was rejected but the
/// connection is fine); everything else is connection-level and forces the
/// caller to open a fresh session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// True for errors that invalidate the underlying connection.
    pub fn is_connection_error(&self) -> bool {
        !matches!(self, SessionError::Query(_))
    }
}

/// One row of replica detail from the replication system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaDetail {
    /// Replica address as reported by the server (may be absent)
    pub addr: Option<String>,
    /// Replication sync state descriptor
    pub state: Option<String>,
}

/// A live session against one cluster node.
///
/// Exclusively owned by the probe loop; lent by reference to the inspector
/// and executor for the duration of a single operation.
#[async_trait]
pub trait ProbeSession: Send + Sync {
    /// Endpoint this session was opened against
    fn endpoint(&self) -> &str;

    /// Whether the session is still usable
    fn is_open(&self) -> bool;

    /// Mark the session closed and tear down the transport.
    fn close(&mut self);

    /// Trivial liveness check (`SELECT 1`)
    async fn ping(&self) -> Result<(), SessionError>;

    /// Recovery state: true means the node is a standby
    async fn recovery_state(&self) -> Result<bool, SessionError>;

    /// Number of active replica connections
    async fn replica_count(&self) -> Result<i64, SessionError>;

    /// First replica's reported address and sync state, if any
    async fn replica_detail(&self) -> Result<Option<ReplicaDetail>, SessionError>;

    /// Address this node reports for itself
    async fn server_addr(&self) -> Result<Option<String>, SessionError>;

    /// Append one row with the given sequence number
    async fn insert_row(&self, seq: i64) -> Result<(), SessionError>;

    /// Latest sequence number in the probe table, if any rows exist
    async fn read_latest_seq(&self) -> Result<Option<i64>, SessionError>;
}

/// Opens sessions against the floating endpoint.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: ProbeSession;

    async fn open(&self) -> Result<Self::Session, SessionError>;
}

/// Bound error text to `max` characters.
pub fn truncate_error(msg: &str, max: usize) -> String {
    msg.chars().take(max).collect()
}

#[cfg(test)]
pub(crate) mod mock;
