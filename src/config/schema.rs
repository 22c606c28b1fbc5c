use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which operation the probe performs each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    /// Insert one row per cycle; requires landing on the primary.
    #[default]
    Write,
    /// Read the latest row per cycle; any reachable node is accepted.
    Read,
}

impl ProbeMode {
    /// Parse the probe mode from the first CLI argument.
    ///
    /// Missing argument defaults to `Write`; anything unrecognized is an error.
    pub fn from_arg(arg: Option<&str>) -> Result<Self, String> {
        match arg {
            None => Ok(Self::Write),
            Some("write") => Ok(Self::Write),
            Some("read") => Ok(Self::Read),
            Some(other) => Err(format!("unknown probe mode '{other}' (expected write|read)")),
        }
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => write!(f, "write"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// Probe configuration, sourced from the environment.
///
/// Every field is optional with a stated default so the probe can run against
/// a local cluster with no setup at all.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database name
    pub database: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Floating endpoint address (routes to the current primary)
    pub host: String,
    /// Port number
    pub port: u16,
    /// Physical cluster node addresses, used for peer inference
    pub cluster_nodes: Vec<String>,
    /// Transport-level connect timeout
    pub connect_timeout: Duration,
    /// Sleep between successful operations
    pub normal_interval: Duration,
    /// Sleep after a failed cycle (rate-limits load on a degraded cluster)
    pub retry_interval: Duration,
    /// Connect attempts per cycle before reporting the endpoint unavailable
    pub connect_attempts: u32,
    /// Wall-clock budget for a single read or write operation
    pub op_timeout: Duration,
}

impl Config {
    /// Load configuration from `HAPROBE_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            database: env_or("HAPROBE_DB", "postgres"),
            user: env_or("HAPROBE_USER", "probe"),
            password: env_or("HAPROBE_PWD", ""),
            host: env_or("HAPROBE_HOST", "127.0.0.1"),
            port: env_parse("HAPROBE_PORT", 5432),
            cluster_nodes: env_list("HAPROBE_CLUSTER_NODES"),
            connect_timeout: Duration::from_millis(env_parse("HAPROBE_CONNECT_TIMEOUT_MS", 3000)),
            normal_interval: Duration::from_millis(env_parse("HAPROBE_NORMAL_INTERVAL_MS", 100)),
            retry_interval: Duration::from_millis(env_parse("HAPROBE_RETRY_INTERVAL_MS", 2000)),
            connect_attempts: env_parse("HAPROBE_CONNECT_ATTEMPTS", 2),
            op_timeout: Duration::from_millis(env_parse("HAPROBE_OP_TIMEOUT_MS", 2000)),
        }
    }

    /// Endpoint as `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "postgres".to_string(),
            user: "probe".to_string(),
            password: String::new(),
            host: "127.0.0.1".to_string(),
            port: 5432,
            cluster_nodes: Vec::new(),
            connect_timeout: Duration::from_millis(3000),
            normal_interval: Duration::from_millis(100),
            retry_interval: Duration::from_millis(2000),
            connect_attempts: 2,
            op_timeout: Duration::from_millis(2000),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
