//! `tokio-postgres` implementation of the session seam.

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::debug;

use crate::config::{Config, ProbeMode};

use super::{truncate_error, ProbeSession, ReplicaDetail, SessionError, SessionFactory, MAX_ERROR_LEN};

/// Opens `PgSession`s against the floating endpoint.
pub struct PgSessionFactory {
    pg_config: tokio_postgres::Config,
    endpoint: String,
}

impl PgSessionFactory {
    pub fn new(config: &Config, mode: ProbeMode) -> Self {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .user(&config.user)
            .password(&config.password)
            .dbname(&config.database)
            .connect_timeout(config.connect_timeout);

        // Async commit keeps write latency flat while the standby catches up.
        if mode == ProbeMode::Write {
            pg_config.options("-c synchronous_commit=off");
        }

        Self {
            pg_config,
            endpoint: config.endpoint(),
        }
    }
}

#[async_trait]
impl SessionFactory for PgSessionFactory {
    type Session = PgSession;

    async fn open(&self) -> Result<PgSession, SessionError> {
        let (client, connection) = self
            .pg_config
            .connect(NoTls)
            .await
            .map_err(|e| SessionError::Connect(truncate_error(&e.to_string(), MAX_ERROR_LEN)))?;

        let endpoint = self.endpoint.clone();
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(endpoint = %endpoint, error = %e, "connection driver ended");
            }
        });

        Ok(PgSession {
            client,
            driver,
            endpoint: self.endpoint.clone(),
            open: true,
        })
    }
}

/// One live connection plus its background driver task.
pub struct PgSession {
    client: Client,
    driver: JoinHandle<()>,
    endpoint: String,
    open: bool,
}

impl PgSession {
    /// Pre-flight for the write probe: make sure the probe table exists and
    /// starts empty so the measurement baseline is clean.
    pub async fn prepare_probe_table(&self) -> Result<(), SessionError> {
        self.client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS ha_probe_samples (\
                   seq BIGINT NOT NULL,\
                   recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()\
                 );\
                 TRUNCATE TABLE ha_probe_samples;",
            )
            .await
            .map_err(map_pg_err)
    }
}

#[async_trait]
impl ProbeSession for PgSession {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn is_open(&self) -> bool {
        self.open && !self.client.is_closed()
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.driver.abort();
        }
    }

    async fn ping(&self) -> Result<(), SessionError> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(map_pg_err)
    }

    async fn recovery_state(&self) -> Result<bool, SessionError> {
        let row = self
            .client
            .query_one("SELECT pg_is_in_recovery()", &[])
            .await
            .map_err(map_pg_err)?;
        Ok(row.get::<_, bool>(0))
    }

    async fn replica_count(&self) -> Result<i64, SessionError> {
        let row = self
            .client
            .query_one("SELECT count(*) FROM pg_stat_replication", &[])
            .await
            .map_err(map_pg_err)?;
        Ok(row.get::<_, i64>(0))
    }

    async fn replica_detail(&self) -> Result<Option<ReplicaDetail>, SessionError> {
        let row = self
            .client
            .query_opt(
                "SELECT client_addr::text, state FROM pg_stat_replication LIMIT 1",
                &[],
            )
            .await
            .map_err(map_pg_err)?;
        Ok(row.map(|r| ReplicaDetail {
            addr: r.get::<_, Option<String>>(0),
            state: r.get::<_, Option<String>>(1),
        }))
    }

    async fn server_addr(&self) -> Result<Option<String>, SessionError> {
        let row = self
            .client
            .query_one("SELECT inet_server_addr()::text", &[])
            .await
            .map_err(map_pg_err)?;
        Ok(row.get::<_, Option<String>>(0))
    }

    async fn insert_row(&self, seq: i64) -> Result<(), SessionError> {
        self.client
            .execute(
                "INSERT INTO ha_probe_samples (seq, recorded_at) VALUES ($1, now())",
                &[&seq],
            )
            .await
            .map(|_| ())
            .map_err(map_pg_err)
    }

    async fn read_latest_seq(&self) -> Result<Option<i64>, SessionError> {
        let row = self
            .client
            .query_opt(
                "SELECT seq FROM ha_probe_samples ORDER BY seq DESC LIMIT 1",
                &[],
            )
            .await
            .map_err(map_pg_err)?;
        Ok(row.map(|r| r.get::<_, i64>(0)))
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Map a driver error to the session taxonomy.
///
/// Errors carrying a server-side diagnostic are content-level; anything else
/// (broken transport, closed connection) is connection-level.
fn map_pg_err(e: tokio_postgres::Error) -> SessionError {
    let msg = truncate_error(&e.to_string(), MAX_ERROR_LEN);
    if e.as_db_error().is_some() {
        SessionError::Query(msg)
    } else if e.is_closed() {
        SessionError::Closed
    } else {
        SessionError::Io(msg)
    }
}
