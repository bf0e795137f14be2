//! Allocation registry
//!
//! A registry holds the records of one (element type, array size)
//! combination, keyed by address. It never frees memory itself: removal of
//! zero-count records and the actual deallocation belong to the collector.

use super::collector::GcStats;
use super::record::AllocationRecord;
use crate::defaults::NULL_VALUE_PLACEHOLDER;
use crate::{GcError, GcResult};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;

/// Registry shared behind a lock, as held by the process-wide store
pub type RegistryCell<T> = Mutex<Registry<T>>;

/// Records of all tracked allocations for one combination
pub struct Registry<T> {
    /// Records keyed by address (null is key 0)
    records: FxHashMap<usize, AllocationRecord<T>>,

    /// Fixed array size of the combination (0 = single objects)
    array_size: usize,

    /// Generation stamped on the most recently inserted record
    generation: u64,

    /// Collection statistics
    stats: GcStats,
}

impl<T> Registry<T> {
    /// Create an empty registry for the given fixed array size
    pub fn new(array_size: usize) -> Self {
        Self::with_capacity(array_size, 0)
    }

    /// Create an empty registry with room for `capacity` records
    pub fn with_capacity(array_size: usize, capacity: usize) -> Self {
        let mut records = FxHashMap::default();
        records.reserve(capacity);
        Self {
            records,
            array_size,
            generation: 0,
            stats: GcStats::default(),
        }
    }

    /// Fixed array size of this registry's combination
    pub fn array_size(&self) -> usize {
        self.array_size
    }

    /// Find the record for an address
    pub fn find(&self, address: *const T) -> Option<&AllocationRecord<T>> {
        self.records.get(&(address as usize))
    }

    /// Insert a new record, stamping it with the next generation
    pub fn insert(&mut self, mut record: AllocationRecord<T>) -> GcResult<()> {
        let key = record.addr();
        if self.records.contains_key(&key) {
            return Err(GcError::AlreadyTracked { address: key });
        }
        self.generation += 1;
        record.stamp(self.generation);
        self.records.insert(key, record);
        Ok(())
    }

    /// Remove the record equal (same address and count) to `record`
    pub fn remove(&mut self, record: &AllocationRecord<T>) -> Option<AllocationRecord<T>> {
        let key = record.addr();
        match self.records.get(&key) {
            Some(stored) if stored == record => self.records.remove(&key),
            _ => None,
        }
    }

    /// Number of tracked allocations
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Increment the count of an existing record
    pub fn retain(&mut self, address: *const T) -> GcResult<&AllocationRecord<T>> {
        self.retain_matching(address, None)
    }

    /// Increment the count of the record for `address` only if it still
    /// carries `generation`
    pub fn retain_generation(
        &mut self,
        address: *const T,
        generation: u64,
    ) -> GcResult<&AllocationRecord<T>> {
        self.retain_matching(address, Some(generation))
    }

    /// Increment the record for `address`, creating it with a count of one
    /// if the address is new
    pub fn retain_or_insert(
        &mut self,
        address: *mut T,
        size_hint: usize,
    ) -> GcResult<&AllocationRecord<T>> {
        if !self.records.contains_key(&(address as usize)) {
            self.insert(AllocationRecord::new(address, size_hint))?;
        }
        self.retain(address)
    }

    /// Decrement the count of an existing record, returning the new count
    pub fn release(&mut self, address: *const T) -> GcResult<usize> {
        self.release_matching(address, None)
    }

    /// Decrement the count of the record for `address` only if it still
    /// carries `generation`
    pub fn release_generation(&mut self, address: *const T, generation: u64) -> GcResult<usize> {
        self.release_matching(address, Some(generation))
    }

    fn record_mut(
        &mut self,
        address: *const T,
        generation: Option<u64>,
    ) -> GcResult<&mut AllocationRecord<T>> {
        let key = address as usize;
        let record = self
            .records
            .get_mut(&key)
            .ok_or(GcError::Untracked { address: key })?;
        match generation {
            Some(generation) if generation != record.generation() => {
                Err(GcError::StaleGeneration {
                    address: key,
                    generation,
                    current: record.generation(),
                })
            }
            _ => Ok(record),
        }
    }

    fn retain_matching(
        &mut self,
        address: *const T,
        generation: Option<u64>,
    ) -> GcResult<&AllocationRecord<T>> {
        let key = address as usize;
        let record = self.record_mut(address, generation)?;
        let count = record
            .increment()
            .ok_or(GcError::CountOverflow { address: key })?;
        log::trace!("retain {:#x} -> {}", key, count);
        Ok(record)
    }

    fn release_matching(&mut self, address: *const T, generation: Option<u64>) -> GcResult<usize> {
        let key = address as usize;
        let record = self.record_mut(address, generation)?;
        let count = record
            .decrement()
            .ok_or(GcError::CountUnderflow { address: key })?;
        log::trace!("release {:#x} -> {}", key, count);
        Ok(count)
    }

    /// Remove and return the first record whose count is zero
    pub fn take_unreferenced(&mut self) -> Option<AllocationRecord<T>> {
        let key = self
            .records
            .values()
            .find(|record| record.ref_count() == 0)
            .map(AllocationRecord::addr)?;
        self.records.remove(&key)
    }

    /// Force every count to zero
    pub fn zero_all(&mut self) {
        for record in self.records.values_mut() {
            record.clear_count();
        }
    }

    /// Iterate over all records (unordered)
    pub fn iter(&self) -> impl Iterator<Item = &AllocationRecord<T>> + '_ {
        self.records.values()
    }

    /// Collection statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut GcStats {
        &mut self.stats
    }
}

impl<T: fmt::Display> fmt::Display for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "registry<{}, {}>:",
            std::any::type_name::<T>(),
            self.array_size
        )?;
        writeln!(f, "address refcount value")?;
        if self.records.is_empty() {
            return writeln!(f, "  registry is empty");
        }

        let mut records: Vec<&AllocationRecord<T>> = self.records.values().collect();
        records.sort_by_key(|record| record.addr());

        for record in records {
            write!(f, "[{:p}] {} ", record.address(), record.ref_count())?;
            if record.is_null() {
                writeln!(f, "{}", NULL_VALUE_PLACEHOLDER)?;
            } else {
                // SAFETY: records stay in the registry until the collector has
                // removed them, and memory is only freed after removal.
                let value = unsafe { &*record.address() };
                writeln!(f, "{}", value)?;
            }
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("array_size", &self.array_size)
            .field("records", &self.records.len())
            .field("stats", &self.stats)
            .finish()
    }
}
