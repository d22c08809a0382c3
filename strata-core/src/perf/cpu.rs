//! CPU affinity and thread priority
//!
//! Workers optionally pin themselves to a core so the scheduler does not
//! migrate a hot consumer between caches. Pinning is best effort: on
//! platforms or containers that refuse it the worker keeps running unpinned.

use anyhow::Result;
use core_affinity::CoreId;

/// Pin the current thread to `core`.
///
/// ```no_run
/// use strata_core::perf::cpu::pin_to_core;
/// pin_to_core(2).expect("Failed to pin to core 2");
/// ```
pub fn pin_to_core(core: usize) -> Result<()> {
    if core_affinity::set_for_current(CoreId { id: core }) {
        tracing::debug!("Pinned thread to CPU core {}", core);
        Ok(())
    } else {
        anyhow::bail!("Failed to pin thread to core {}", core)
    }
}

/// Core assigned to worker `worker`: round-robin over the available cores
pub fn worker_core(worker: usize) -> usize {
    worker % num_cores()
}

/// Pin worker `worker` to its round-robin core. Failure is logged, never fatal.
pub fn pin_worker(worker: usize) -> bool {
    let core = worker_core(worker);
    match pin_to_core(core) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(worker, core, "CPU pinning unavailable: {:#}", e);
            false
        }
    }
}

/// Set SCHED_FIFO priority for the current thread (Linux only).
///
/// Requires CAP_SYS_NICE or root.
#[cfg(target_os = "linux")]
pub fn set_realtime_priority(priority: i32) -> Result<()> {
    use libc::{sched_param, sched_setscheduler, SCHED_FIFO};

    let param = sched_param {
        sched_priority: priority,
    };
    // SAFETY: pid 0 targets the calling thread; `param` outlives the call.
    let rc = unsafe { sched_setscheduler(0, SCHED_FIFO, &param) };
    if rc == 0 {
        tracing::info!("Set thread priority to SCHED_FIFO:{}", priority);
        Ok(())
    } else {
        anyhow::bail!("Failed to set thread priority (may need CAP_SYS_NICE or root)")
    }
}

#[cfg(not(target_os = "linux"))]
pub fn set_realtime_priority(_priority: i32) -> Result<()> {
    tracing::warn!("Real-time priority setting not supported on this platform");
    Ok(())
}

/// Number of cores the process may run on (at least 1)
pub fn num_cores() -> usize {
    core_affinity::get_core_ids()
        .map(|ids| ids.len())
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_cores() {
        assert!(num_cores() >= 1);
    }

    #[test]
    fn test_worker_core_wraps() {
        let cores = num_cores();
        assert_eq!(worker_core(0), 0);
        assert_eq!(worker_core(cores), 0);
        assert_eq!(worker_core(cores + 1), 1 % cores);
    }

    #[test]
    fn test_pin_worker_never_panics() {
        // May be refused in containers; only the absence of a panic matters
        let _ = std::thread::spawn(|| pin_worker(0)).join().unwrap();
    }

    #[test]
    fn test_pin_out_of_range_fails() {
        assert!(pin_to_core(usize::MAX).is_err());
    }
}
