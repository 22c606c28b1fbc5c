//! Failover-aware availability probe for primary/standby database clusters.
//!
//! The probe drives read or write operations against a floating-IP endpoint,
//! detects disconnections and role changes caused by failover, reconnects
//! transparently and accumulates reliability counters for a final report.

pub mod config;
pub mod connect;
pub mod executor;
pub mod inspect;
pub mod probe;
pub mod session;
pub mod stats;
