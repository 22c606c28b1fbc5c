//! Scripted sessions for exercising the probe state machine in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ProbeSession, ReplicaDetail, SessionError, SessionFactory};

/// Scripted outcome for a single session method.
#[derive(Debug, Clone)]
pub(crate) enum MockResp<T: Clone> {
    Ok(T),
    /// Content-level failure (connection stays usable)
    QueryErr(String),
    /// Connection-level failure
    ConnErr(String),
    /// Never completes; used to simulate a hung node
    Hang,
}

async fn resolve<T: Clone>(resp: &MockResp<T>) -> Result<T, SessionError> {
    match resp {
        MockResp::Ok(v) => Ok(v.clone()),
        MockResp::QueryErr(m) => Err(SessionError::Query(m.clone())),
        MockResp::ConnErr(m) => Err(SessionError::Io(m.clone())),
        MockResp::Hang => {
            let () = std::future::pending().await;
            unreachable!()
        }
    }
}

#[derive(Clone)]
pub(crate) struct MockSession {
    pub endpoint: String,
    pub open: bool,
    pub recovery: MockResp<bool>,
    pub replica_count: MockResp<i64>,
    pub replica_detail: MockResp<Option<ReplicaDetail>>,
    pub server_addr: MockResp<Option<String>>,
    pub insert: MockResp<()>,
    pub read_latest: MockResp<Option<i64>>,
    /// Ping fails with a connection error after this many successful calls
    pub ping_fail_after: Option<u64>,
    pub(crate) ping_calls: Arc<AtomicU64>,
    /// Total insert/read calls, shared across clones of this session
    pub op_calls: Arc<AtomicU64>,
    /// Invoked with the running op count after each insert/read
    pub op_hook: Option<Arc<dyn Fn(u64) + Send + Sync>>,
}

impl MockSession {
    /// A healthy primary with one connected replica.
    pub fn primary() -> Self {
        Self {
            endpoint: "10.0.0.230:5432".to_string(),
            open: true,
            recovery: MockResp::Ok(false),
            replica_count: MockResp::Ok(1),
            replica_detail: MockResp::Ok(Some(ReplicaDetail {
                addr: Some("10.0.0.232".to_string()),
                state: Some("sync".to_string()),
            })),
            server_addr: MockResp::Ok(Some("10.0.0.231".to_string())),
            insert: MockResp::Ok(()),
            read_latest: MockResp::Ok(Some(42)),
            ping_fail_after: None,
            ping_calls: Arc::new(AtomicU64::new(0)),
            op_calls: Arc::new(AtomicU64::new(0)),
            op_hook: None,
        }
    }

    /// A standby with no replica rows of its own.
    pub fn standby(own_addr: &str) -> Self {
        Self {
            recovery: MockResp::Ok(true),
            replica_count: MockResp::Ok(0),
            replica_detail: MockResp::Ok(None),
            server_addr: MockResp::Ok(Some(own_addr.to_string())),
            ..Self::primary()
        }
    }

    fn record_op(&self) -> Result<(), SessionError> {
        let n = self.op_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = &self.op_hook {
            hook(n);
        }
        Ok(())
    }
}

#[async_trait]
impl ProbeSession for MockSession {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }

    async fn ping(&self) -> Result<(), SessionError> {
        let n = self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.ping_fail_after {
            if n >= limit {
                return Err(SessionError::Io("ping failed".to_string()));
            }
        }
        Ok(())
    }

    async fn recovery_state(&self) -> Result<bool, SessionError> {
        resolve(&self.recovery).await
    }

    async fn replica_count(&self) -> Result<i64, SessionError> {
        resolve(&self.replica_count).await
    }

    async fn replica_detail(&self) -> Result<Option<ReplicaDetail>, SessionError> {
        resolve(&self.replica_detail).await
    }

    async fn server_addr(&self) -> Result<Option<String>, SessionError> {
        resolve(&self.server_addr).await
    }

    async fn insert_row(&self, _seq: i64) -> Result<(), SessionError> {
        resolve(&self.insert).await?;
        self.record_op()
    }

    async fn read_latest_seq(&self) -> Result<Option<i64>, SessionError> {
        let latest = resolve(&self.read_latest).await?;
        self.record_op()?;
        Ok(latest)
    }
}

/// One scripted factory step.
pub(crate) enum MockStep {
    Fail(String),
    Session(MockSession),
}

/// Hands out scripted sessions in order, then clones of a fallback.
pub(crate) struct MockFactory {
    scripted: Mutex<VecDeque<MockStep>>,
    fallback: Option<MockSession>,
    pub opened: AtomicUsize,
}

impl MockFactory {
    pub fn new(scripted: Vec<MockStep>, fallback: Option<MockSession>) -> Self {
        Self {
            scripted: Mutex::new(scripted.into()),
            fallback,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn always(session: MockSession) -> Self {
        Self::new(Vec::new(), Some(session))
    }

    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    type Session = MockSession;

    async fn open(&self) -> Result<MockSession, SessionError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let step = self.scripted.lock().expect("factory lock").pop_front();
        match step {
            Some(MockStep::Fail(msg)) => Err(SessionError::Connect(msg)),
            Some(MockStep::Session(session)) => Ok(session),
            None => match &self.fallback {
                Some(template) => Ok(template.clone()),
                None => Err(SessionError::Connect("no scripted session left".to_string())),
            },
        }
    }
}
