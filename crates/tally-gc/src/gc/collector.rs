//! Sweep collector
//!
//! Collection repeatedly takes the first zero-count record out of the
//! registry, frees its memory and starts over, until a scan finds no
//! zero-count record. The registry lock is dropped while memory is freed, so
//! destructors of reclaimed values may themselves drop handles.

use super::registry::RegistryCell;
use std::time::{Duration, Instant};

/// Collection statistics for one registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Total number of collections
    pub collections: usize,

    /// Total records removed (including null records)
    pub records_reclaimed: usize,

    /// Total allocations freed
    pub allocations_freed: usize,

    /// Records removed by the last collection
    pub last_reclaimed: usize,

    /// Total time spent collecting
    pub total_pause_time: Duration,

    /// Duration of the last collection
    pub last_pause_time: Duration,

    /// Number of forced drains
    pub shutdowns: usize,
}

impl GcStats {
    fn update(&mut self, pause_time: Duration, reclaimed: usize, freed: usize) {
        self.collections += 1;
        self.records_reclaimed += reclaimed;
        self.allocations_freed += freed;
        self.last_reclaimed = reclaimed;
        self.total_pause_time += pause_time;
        self.last_pause_time = pause_time;
    }
}

/// Reclaim every zero-count record of a registry
///
/// Returns `true` if at least one record was removed by this call.
pub fn collect<T>(registry: &RegistryCell<T>) -> bool {
    let start = Instant::now();
    let mut reclaimed = 0;
    let mut freed = 0;

    loop {
        let record = match registry.lock().take_unreferenced() {
            Some(record) => record,
            None => break,
        };

        // SAFETY: the count reached zero exactly once and the record is out of
        // the registry, so nothing else can free this address.
        if unsafe { record.release_memory() } {
            freed += 1;
        }
        reclaimed += 1;
    }

    let duration = start.elapsed();
    let mut guard = registry.lock();
    guard.stats_mut().update(duration, reclaimed, freed);
    if reclaimed > 0 {
        log::debug!(
            "collected {} record(s), freed {} allocation(s), {} remaining",
            reclaimed,
            freed,
            guard.len()
        );
    }

    reclaimed > 0
}

/// Force-reclaim everything a registry tracks
///
/// No-op on an empty registry. Otherwise every count is forced to zero and a
/// collection runs.
///
/// # Safety
///
/// Live handles into this registry are left dangling; they must not be
/// dereferenced afterwards. Their count operations are rejected by
/// generation, so a record later created at a reused address is unaffected.
/// Intended for process exit only.
pub unsafe fn shutdown<T>(registry: &RegistryCell<T>) {
    {
        let mut guard = registry.lock();
        if guard.is_empty() {
            return;
        }
        log::debug!("draining {} record(s)", guard.len());
        guard.zero_all();
        guard.stats_mut().shutdowns += 1;
    }
    collect(registry);
}
