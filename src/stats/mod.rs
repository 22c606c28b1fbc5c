//! Reliability counters and the final probe report.
//!
//! Counters are owned by the probe loop and mutated only on the single
//! control task, so no synchronization is needed. `record_success` and
//! `record_failure` are the only mutators of the op counters, which keeps
//! `total_ops == success_ops + failed_ops` true after every iteration.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::ProbeMode;

/// Cumulative probe counters.
#[derive(Debug, Clone)]
pub struct Stats {
    pub total_ops: u64,
    pub success_ops: u64,
    pub failed_ops: u64,
    pub reconnects: u64,
    pub started_at: Instant,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_ops: 0,
            success_ops: 0,
            failed_ops: 0,
            reconnects: 0,
            started_at: Instant::now(),
        }
    }

    pub fn record_success(&mut self) {
        self.total_ops += 1;
        self.success_ops += 1;
    }

    pub fn record_failure(&mut self) {
        self.total_ops += 1;
        self.failed_ops += 1;
    }

    pub fn record_reconnect(&mut self) {
        self.reconnects += 1;
    }

    /// Success rate in percent; 0 when nothing ran yet.
    pub fn success_rate_percent(&self) -> f64 {
        if self.total_ops == 0 {
            0.0
        } else {
            self.success_ops as f64 / self.total_ops as f64 * 100.0
        }
    }

    /// Successful operations per second; 0 for a non-positive window.
    pub fn throughput(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.success_ops as f64 / secs
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the final report needs, produced once at termination.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub mode: ProbeMode,
    pub stats: Stats,
    pub elapsed: Duration,
    pub last_node: String,
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.mode {
            ProbeMode::Write => "writes",
            ProbeMode::Read => "reads",
        };
        writeln!(f, "========================================")?;
        writeln!(f, "  primary/standby availability report")?;
        writeln!(f, "========================================")?;
        writeln!(f)?;
        writeln!(f, "probe type      : {}", self.mode)?;
        writeln!(f, "duration        : {:.2} s", self.elapsed.as_secs_f64())?;
        writeln!(f, "reconnects      : {}", self.stats.reconnects)?;
        writeln!(f, "last node       : {}", self.last_node)?;
        writeln!(f)?;
        writeln!(f, "----------------------------------------")?;
        writeln!(f, "total {unit:<10}: {}", self.stats.total_ops)?;
        writeln!(f, "successful      : {}", self.stats.success_ops)?;
        writeln!(f, "failed          : {}", self.stats.failed_ops)?;
        writeln!(
            f,
            "success rate    : {:.2}%",
            self.stats.success_rate_percent()
        )?;
        writeln!(
            f,
            "throughput      : {:.2} {unit}/s",
            self.stats.throughput(self.elapsed)
        )?;
        write!(f, "========================================")
    }
}
