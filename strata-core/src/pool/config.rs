//! Worker pool configuration
//!
//! Loaded once at construction. Every field has a default so a JSON file
//! only needs to name what it changes.

use crate::resilience::RestartPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads (the target active count)
    pub workers: usize,

    /// Capacity of each worker's private queue
    pub worker_queue_capacity: usize,

    /// Capacity of the shared overflow queue
    pub overflow_capacity: usize,

    /// Capacity of the order-ingestion ring, for callers that build one
    pub ring_capacity: usize,

    /// Start with work stealing enabled
    pub work_stealing: bool,

    /// A worker donates only while its private depth exceeds this
    pub steal_threshold: usize,

    /// Pin worker *i* to core `i % cores`
    pub cpu_affinity: bool,

    /// How long an idle worker parks before re-polling
    pub idle_wait_ms: u64,

    /// Minimum gap between two steal requests from the same worker
    pub steal_cooldown_ms: u64,

    /// Control-thread supervision tick
    pub health_check_interval_ms: u64,

    /// Emit a stats message every N processed tasks (0 disables)
    pub stats_interval: u64,

    /// Bound of the shared symbol-hash memo
    pub symbol_cache_capacity: usize,

    /// Capacity of each lifecycle event subscription
    pub event_buffer: usize,

    /// Delay before the second restart of a crash burst (first is immediate)
    pub restart_delay_ms: u64,

    /// Cap on the restart delay
    pub restart_max_delay_ms: u64,

    /// Crash-free time after which the restart delay resets
    pub restart_quiet_period_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            worker_queue_capacity: 1024,
            overflow_capacity: 4096,
            ring_capacity: 65_536,
            work_stealing: true,
            steal_threshold: 10,
            cpu_affinity: false,
            idle_wait_ms: 5,
            steal_cooldown_ms: 10,
            health_check_interval_ms: 50,
            stats_interval: 10_000,
            symbol_cache_capacity: 4096,
            event_buffer: 1024,
            restart_delay_ms: 10,
            restart_max_delay_ms: 1000,
            restart_quiet_period_ms: 5000,
        }
    }
}

impl PoolConfig {
    /// Short waits everywhere, pinned threads
    pub fn low_latency() -> Self {
        Self {
            cpu_affinity: true,
            idle_wait_ms: 1,
            steal_cooldown_ms: 2,
            health_check_interval_ms: 20,
            ..Default::default()
        }
    }

    /// Deep queues, infrequent stealing
    pub fn throughput() -> Self {
        Self {
            worker_queue_capacity: 8192,
            overflow_capacity: 32_768,
            steal_threshold: 256,
            steal_cooldown_ms: 50,
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Load from a JSON file and validate
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pool config {}", path.display()))?;
        let cfg: PoolConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse pool config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        if self.worker_queue_capacity == 0 {
            anyhow::bail!("worker_queue_capacity must be > 0");
        }
        if self.overflow_capacity == 0 {
            anyhow::bail!("overflow_capacity must be > 0");
        }
        if self.ring_capacity == 0 {
            anyhow::bail!("ring_capacity must be > 0");
        }
        if self.steal_threshold >= self.worker_queue_capacity {
            anyhow::bail!(
                "steal_threshold {} must be below worker_queue_capacity {}",
                self.steal_threshold,
                self.worker_queue_capacity
            );
        }
        if self.health_check_interval_ms == 0 {
            anyhow::bail!("health_check_interval_ms must be > 0");
        }
        if self.event_buffer == 0 {
            anyhow::bail!("event_buffer must be > 0");
        }
        if self.restart_delay_ms > self.restart_max_delay_ms {
            anyhow::bail!(
                "restart_delay_ms {} exceeds restart_max_delay_ms {}",
                self.restart_delay_ms,
                self.restart_max_delay_ms
            );
        }
        Ok(())
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms.max(1))
    }

    pub fn steal_cooldown(&self) -> Duration {
        Duration::from_millis(self.steal_cooldown_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy {
            initial_delay: Duration::from_millis(self.restart_delay_ms),
            max_delay: Duration::from_millis(self.restart_max_delay_ms),
            quiet_period: Duration::from_millis(self.restart_quiet_period_ms),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        assert!(PoolConfig::default().validate().is_ok());
        assert!(PoolConfig::low_latency().validate().is_ok());
        assert!(PoolConfig::throughput().validate().is_ok());
    }

    #[test]
    fn test_default_steal_threshold() {
        assert_eq!(PoolConfig::default().steal_threshold, 10);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let cfg = PoolConfig::default().with_workers(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_threshold_above_capacity_rejected() {
        let cfg = PoolConfig {
            worker_queue_capacity: 8,
            steal_threshold: 8,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("steal_threshold"));
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "workers": 2, "work_stealing": false }}"#).unwrap();

        let cfg = PoolConfig::from_json_file(file.path()).unwrap();
        assert_eq!(cfg.workers, 2);
        assert!(!cfg.work_stealing);
        assert_eq!(cfg.worker_queue_capacity, 1024);
    }

    #[test]
    fn test_load_invalid_json_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "workers": 0 }}"#).unwrap();
        assert!(PoolConfig::from_json_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = PoolConfig::from_json_file("/nonexistent/pool.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_restart_policy_from_config() {
        let cfg = PoolConfig {
            restart_delay_ms: 20,
            restart_max_delay_ms: 200,
            ..Default::default()
        };
        let policy = cfg.restart_policy();
        assert_eq!(policy.initial_delay, Duration::from_millis(20));
        assert_eq!(policy.max_delay, Duration::from_millis(200));
    }

    #[test]
    fn test_restart_delay_above_cap_rejected() {
        let cfg = PoolConfig {
            restart_delay_ms: 500,
            restart_max_delay_ms: 100,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_idle_wait_never_zero() {
        let cfg = PoolConfig {
            idle_wait_ms: 0,
            ..Default::default()
        };
        assert_eq!(cfg.idle_wait(), Duration::from_millis(1));
    }
}
