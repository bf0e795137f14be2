//! Allocation records
//!
//! One record describes one tracked heap allocation.

use std::fmt;

/// Metadata for one tracked allocation
///
/// The record does not own `address` on its own: the allocation is shared by
/// every handle counted in `ref_count`, and is released by the collector once
/// the count reaches zero.
///
/// The generation is assigned by the registry when the record is inserted.
/// Handles cache it, so a handle that outlived a forced drain can tell its
/// record apart from a newer one at a reused address.
pub struct AllocationRecord<T> {
    address: *mut T,
    ref_count: usize,
    is_array: bool,
    element_count: usize,
    generation: u64,
}

// SAFETY: the record is the registry's sole token for freeing the allocation,
// so moving it between threads is equivalent to moving a `Box<T>`.
unsafe impl<T: Send> Send for AllocationRecord<T> {}

impl<T> AllocationRecord<T> {
    /// Create a record with a zero count
    ///
    /// A size hint above one marks the allocation as an array of that many
    /// elements; zero or one marks a single object.
    pub fn new(address: *mut T, size_hint: usize) -> Self {
        let is_array = size_hint > 1;
        Self {
            address,
            ref_count: 0,
            is_array,
            element_count: if is_array { size_hint } else { 1 },
            generation: 0,
        }
    }

    /// Tracked address
    #[inline]
    pub fn address(&self) -> *mut T {
        self.address
    }

    /// Address as an integer key
    #[inline]
    pub fn addr(&self) -> usize {
        self.address as usize
    }

    /// Number of live handles referencing the address
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    /// Whether the allocation holds more than one element
    #[inline]
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Number of elements (1 for a single object)
    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Registry generation this record was inserted under (0 if never
    /// inserted)
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the tracked address is null
    #[inline]
    pub fn is_null(&self) -> bool {
        self.address.is_null()
    }

    #[inline]
    pub(crate) fn stamp(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Returns `None` when the count is already at its maximum.
    #[inline]
    pub(crate) fn increment(&mut self) -> Option<usize> {
        self.ref_count = self.ref_count.checked_add(1)?;
        Some(self.ref_count)
    }

    /// Returns `None` when the count is already zero.
    #[inline]
    pub(crate) fn decrement(&mut self) -> Option<usize> {
        self.ref_count = self.ref_count.checked_sub(1)?;
        Some(self.ref_count)
    }

    #[inline]
    pub(crate) fn clear_count(&mut self) {
        self.ref_count = 0;
    }

    #[cfg(test)]
    pub(crate) fn set_ref_count(&mut self, count: usize) {
        self.ref_count = count;
    }

    /// Free the allocation through the path matching its shape
    ///
    /// Returns `false` for a null address, which owns no memory.
    ///
    /// # Safety
    ///
    /// The address must come from `Box<T>` (single object) or `Box<[T]>` of
    /// `element_count` elements (array), and must not be freed again.
    pub(crate) unsafe fn release_memory(&self) -> bool {
        if self.address.is_null() {
            return false;
        }
        if self.is_array {
            let slice = std::ptr::slice_from_raw_parts_mut(self.address, self.element_count);
            drop(Box::from_raw(slice));
        } else {
            drop(Box::from_raw(self.address));
        }
        true
    }
}

// Equality is by value (address and count), as used for remove-by-value.
impl<T> PartialEq for AllocationRecord<T> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.ref_count == other.ref_count
    }
}

impl<T> Eq for AllocationRecord<T> {}

impl<T> fmt::Debug for AllocationRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationRecord")
            .field("address", &self.address)
            .field("ref_count", &self.ref_count)
            .field("is_array", &self.is_array)
            .field("element_count", &self.element_count)
            .field("generation", &self.generation)
            .finish()
    }
}
