//! Executor pool configuration.

use serde::Deserialize;
use std::time::Duration;

/// Sizing and rebalancing thresholds for the THREADSAFE worker pool.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Workers spawned at startup (default: 2).
    #[serde(default = "default_pool_workers")]
    pub pool_workers: usize,
    /// The pool never shrinks below this (default: 1).
    #[serde(default = "default_min_pool_workers")]
    pub min_pool_workers: usize,
    /// The pool never grows beyond this (default: 16).
    #[serde(default = "default_max_pool_workers")]
    pub max_pool_workers: usize,
    /// Queue depth that triggers growth when every worker is busy (default: 50).
    #[serde(default = "default_backlog_threshold")]
    pub backlog_threshold: usize,
    /// A job running longer than this marks its worker as stuck (default: 8000 ms).
    #[serde(default = "default_stall_threshold_ms")]
    pub stall_threshold_ms: u64,
    /// Idle time after which a surplus worker is retired (default: 60000 ms).
    #[serde(default = "default_idle_retire_ms")]
    pub idle_retire_ms: u64,
    /// How long shutdown waits for each worker thread (default: 2000 ms).
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl DispatchConfig {
    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.stall_threshold_ms)
    }

    pub fn idle_retire(&self) -> Duration {
        Duration::from_millis(self.idle_retire_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pool_workers: default_pool_workers(),
            min_pool_workers: default_min_pool_workers(),
            max_pool_workers: default_max_pool_workers(),
            backlog_threshold: default_backlog_threshold(),
            stall_threshold_ms: default_stall_threshold_ms(),
            idle_retire_ms: default_idle_retire_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

fn default_pool_workers() -> usize {
    2
}

fn default_min_pool_workers() -> usize {
    1
}

fn default_max_pool_workers() -> usize {
    16
}

fn default_backlog_threshold() -> usize {
    50
}

fn default_stall_threshold_ms() -> u64 {
    8000
}

fn default_idle_retire_ms() -> u64 {
    60_000
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}
