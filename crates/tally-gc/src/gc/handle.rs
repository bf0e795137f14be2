//! Reference-counted handles
//!
//! This module provides `Handle<T, N>`, a shared smart pointer over a heap
//! allocation tracked by the process-wide registry for `(T, N)`. `N` is the
//! fixed array size of the combination; `0` means single objects.
//!
//! Every handle accounts for exactly one unit of its record's count:
//! construction and `clone` increment it, `drop` and reassignment decrement
//! it. Memory is freed by the collector, which `drop` runs after releasing
//! the reference. Reassignment never collects.
//!
//! Each handle also caches the generation of the record it counts against.
//! After [`Handle::shutdown`] a handle's record is gone, and the address may
//! be reused by a newer record; count operations from such a handle leave
//! every count untouched and are reported through `log::warn!`.
//!
//! A count that would pass `usize::MAX` aborts the process, as `Rc` and `Arc`
//! do: a wrapped count would let the collector free a live value.

use super::collector::{self, GcStats};
use super::global;
use super::iter::GcIter;
use crate::options::options;
use crate::{GcError, GcResult};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Deref, Index};
use std::ptr;

/// Shared pointer to a tracked single object (`N = 0`) or `N`-element array
///
/// # Memory Layout
///
/// ```text
/// Handle { addr, is_array, len }        registry<T, N>
///     │                                 ┌──────────────────────────────┐
///     └──── addr ──────────────────────►│ addr → { ref_count, shape }  │
///                                       └──────────────────────────────┘
/// ```
///
/// Like `Arc`, a handle is `Send` and `Sync` only when `T` is both: every
/// count change goes through the registry lock, and the last release may
/// free `T` on any thread.
pub struct Handle<T: Send + 'static, const N: usize = 0> {
    addr: *mut T,
    is_array: bool,
    element_count: usize,
    generation: u64,
    _phantom: PhantomData<T>,
}

// SAFETY: counts are only touched under the registry lock; shared access
// hands out `&T`, which requires `T: Sync` across threads.
unsafe impl<T: Send + Sync + 'static, const N: usize> Send for Handle<T, N> {}
unsafe impl<T: Send + Sync + 'static, const N: usize> Sync for Handle<T, N> {}

impl<T: Send + 'static> Handle<T, 0> {
    /// Move `value` to the heap and track it
    pub fn new(value: T) -> Self {
        let addr = Box::into_raw(Box::new(value));
        Self::track(addr)
    }

    /// Point this handle at a freshly boxed `value`
    ///
    /// The previous address loses one reference but is not collected here.
    pub fn replace(&mut self, value: T) -> &mut Self {
        let addr = Box::into_raw(Box::new(value));
        // SAFETY: `addr` comes from `Box<T>` and is not tracked yet.
        unsafe { self.assign_raw(addr) }
    }
}

impl<T: Send + 'static, const N: usize> Handle<T, N> {
    /// Track a raw address
    ///
    /// If the address already has a record its count is incremented,
    /// otherwise a record with a count of one is created.
    ///
    /// # Safety
    ///
    /// `addr` must be null, or come from `Box<T>` when `N <= 1`, or from a
    /// `Box<[T]>` of exactly `N` elements when `N > 1`. Ownership passes to
    /// the registry: the caller must not free it.
    pub unsafe fn from_raw(addr: *mut T) -> Self {
        Self::track(addr)
    }

    /// Handle tracking the null address
    ///
    /// The null record is registered like any other address so that later
    /// releases find a match.
    pub fn null() -> Self {
        Self::track(ptr::null_mut())
    }

    /// Move an `N`-element array to the heap and track it
    pub fn from_array(values: [T; N]) -> Self {
        const { assert!(N > 0, "from_array requires a non-zero array size") };
        let addr = Box::into_raw(Box::new(values)) as *mut T;
        Self::track(addr)
    }

    /// Track a boxed slice of exactly `N` elements (one element when `N` is 0)
    pub fn from_boxed_slice(values: Box<[T]>) -> GcResult<Self> {
        let expected = N.max(1);
        if values.len() != expected {
            return Err(GcError::LengthMismatch {
                expected,
                actual: values.len(),
            });
        }
        let addr = Box::into_raw(values) as *mut T;
        Ok(Self::track(addr))
    }

    fn track(addr: *mut T) -> Self {
        let mut registry = global::registry::<T, N>().lock();
        let record = match registry.retain_or_insert(addr, N) {
            Ok(record) => record,
            Err(err) => abort_on_overflow(err),
        };
        Self {
            addr,
            is_array: record.is_array(),
            element_count: record.element_count(),
            generation: record.generation(),
            _phantom: PhantomData,
        }
    }

    /// Point this handle at a raw address
    ///
    /// Releases one reference on the current address, then attaches to the
    /// record for `addr` (or creates it). Does not collect.
    ///
    /// # Safety
    ///
    /// Same contract as [`Handle::from_raw`].
    pub unsafe fn assign_raw(&mut self, addr: *mut T) -> &mut Self {
        let mut registry = global::registry::<T, N>().lock();
        if let Err(err) = registry.release_generation(self.addr, self.generation) {
            log::warn!("reassigning handle: {}", err);
        }
        match registry.retain_or_insert(addr, N) {
            Ok(record) => {
                self.is_array = record.is_array();
                self.element_count = record.element_count();
                self.generation = record.generation();
            }
            Err(err) => abort_on_overflow(err),
        }
        self.addr = addr;
        self
    }

    /// Point this handle at the address held by `other`
    ///
    /// Releases one reference on the current address and adds one to
    /// `other`'s. Does not collect.
    pub fn assign(&mut self, other: &Self) -> &mut Self {
        let mut registry = global::registry::<T, N>().lock();
        if let Err(err) = registry.release_generation(self.addr, self.generation) {
            log::warn!("reassigning handle: {}", err);
        }
        match registry.retain_generation(other.addr, other.generation) {
            Ok(_) => {}
            Err(err @ GcError::CountOverflow { .. }) => abort_on_overflow(err),
            Err(err) => log::warn!("assigning from handle: {}", err),
        }
        self.is_array = other.is_array;
        self.element_count = other.element_count;
        self.generation = other.generation;
        self.addr = other.addr;
        self
    }

    /// Raw address held by this handle
    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.addr
    }

    /// Check if this handle holds the null address
    #[inline]
    pub fn is_null(&self) -> bool {
        self.addr.is_null()
    }

    /// Whether the allocation holds more than one element
    #[inline]
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Number of addressable elements (0 for a null handle)
    #[inline]
    pub fn len(&self) -> usize {
        if self.addr.is_null() {
            0
        } else {
            self.element_count
        }
    }

    /// Check if there is no addressable element
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared reference to the (first) element, `None` for a null handle
    pub fn get(&self) -> Option<&T> {
        if self.addr.is_null() {
            return None;
        }
        // SAFETY: this handle holds a reference, so the collector has not
        // freed the allocation.
        Some(unsafe { &*self.addr })
    }

    /// Mutable reference to the (first) element when no other handle shares
    /// the address
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if self.addr.is_null() || self.ref_count() != 1 {
            return None;
        }
        // SAFETY: sole handle to a live allocation, borrowed mutably.
        Some(unsafe { &mut *self.addr })
    }

    /// All addressable elements
    pub fn as_slice(&self) -> &[T] {
        if self.addr.is_null() {
            return &[];
        }
        // SAFETY: a live allocation of `element_count` elements.
        unsafe { std::slice::from_raw_parts(self.addr, self.element_count) }
    }

    /// All addressable elements, mutably, when no other handle shares the
    /// address
    pub fn as_mut_slice(&mut self) -> Option<&mut [T]> {
        if self.addr.is_null() || self.ref_count() != 1 {
            return None;
        }
        // SAFETY: sole handle to a live allocation, borrowed mutably.
        Some(unsafe { std::slice::from_raw_parts_mut(self.addr, self.element_count) })
    }

    /// Element `index` without bounds checking
    ///
    /// # Safety
    ///
    /// `index` must be below [`Handle::len`].
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        &*self.addr.add(index)
    }

    /// Current count of the record this handle counts against
    ///
    /// Zero when that record is gone (after [`Handle::shutdown`]).
    pub fn ref_count(&self) -> usize {
        global::registry::<T, N>()
            .lock()
            .find(self.addr)
            .filter(|record| record.generation() == self.generation)
            .map_or(0, |record| record.ref_count())
    }

    /// Cursor at the first element
    pub fn begin(&self) -> GcIter<'_, T> {
        GcIter::new(self.addr, 0, self.len())
    }

    /// Cursor one past the last element
    pub fn end(&self) -> GcIter<'_, T> {
        let len = self.len();
        GcIter::new(self.addr, len as isize, len)
    }

    /// Iterate over the addressable elements
    pub fn iter(&self) -> GcIter<'_, T> {
        self.begin()
    }

    /// Number of allocations tracked for `(T, N)`
    pub fn registry_size() -> usize {
        global::registry::<T, N>().lock().len()
    }

    /// Collection statistics for `(T, N)`
    pub fn stats() -> GcStats {
        global::registry::<T, N>().lock().stats().clone()
    }

    /// Free every allocation of `(T, N)` whose count is zero
    ///
    /// Returns `true` if at least one record was reclaimed.
    pub fn collect() -> bool {
        collector::collect(global::registry::<T, N>())
    }

    /// Force-free everything tracked for `(T, N)`
    ///
    /// This is what the exit hook runs at process termination.
    ///
    /// # Safety
    ///
    /// Live handles of `(T, N)` dangle afterwards and must not be
    /// dereferenced. Dropping, cloning or reassigning them is fine: they
    /// carry the generation of a record that no longer exists, so their
    /// count operations are reported and otherwise ignored, even once the
    /// allocator hands the same address to a new handle.
    pub unsafe fn shutdown() {
        collector::shutdown(global::registry::<T, N>())
    }
}

#[cold]
fn abort_on_overflow(err: GcError) -> ! {
    log::error!("{}; aborting", err);
    std::process::abort()
}

impl<T: Send + fmt::Display + 'static, const N: usize> Handle<T, N> {
    /// Listing of every record of `(T, N)`: address, count and value
    ///
    /// `T`'s `Display` runs with the registry locked and must not create or
    /// drop handles of the same combination.
    pub fn registry_listing() -> String {
        global::registry::<T, N>().lock().to_string()
    }

    /// Print [`Handle::registry_listing`] to stdout
    pub fn show_registry() {
        println!("{}", Self::registry_listing());
    }
}

impl<T: Send + 'static, const N: usize> Default for Handle<T, N> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: Send + 'static, const N: usize> Clone for Handle<T, N> {
    fn clone(&self) -> Self {
        let retained = global::registry::<T, N>()
            .lock()
            .retain_generation(self.addr, self.generation)
            .map(|_| ());
        match retained {
            Ok(()) => {}
            Err(err @ GcError::CountOverflow { .. }) => abort_on_overflow(err),
            Err(err) => log::warn!("cloning handle: {}", err),
        }
        Self {
            addr: self.addr,
            is_array: self.is_array,
            element_count: self.element_count,
            generation: self.generation,
            _phantom: PhantomData,
        }
    }
}

impl<T: Send + 'static, const N: usize> Drop for Handle<T, N> {
    fn drop(&mut self) {
        let cell = global::registry::<T, N>();
        // Release before collecting: the guard must be gone when destructors
        // of reclaimed values run.
        let released = cell.lock().release_generation(self.addr, self.generation);
        if let Err(err) = released {
            log::warn!("dropping handle: {}", err);
        }
        if options().collect_on_release {
            collector::collect(cell);
        }
    }
}

impl<T: Send + 'static, const N: usize> Deref for Handle<T, N> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is null.
    #[inline]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced a null Handle"),
        }
    }
}

impl<T: Send + 'static, const N: usize> Index<usize> for Handle<T, N> {
    type Output = T;

    /// # Panics
    ///
    /// Panics if `index` is not below [`Handle::len`].
    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<'a, T: Send + 'static, const N: usize> IntoIterator for &'a Handle<T, N> {
    type Item = &'a T;
    type IntoIter = GcIter<'a, T>;

    fn into_iter(self) -> GcIter<'a, T> {
        self.begin()
    }
}

// Equality based on address
impl<T: Send + 'static, const N: usize> PartialEq for Handle<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl<T: Send + 'static, const N: usize> Eq for Handle<T, N> {}

impl<T: Send + 'static, const N: usize> Hash for Handle<T, N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.addr as usize).hash(state);
    }
}

impl<T: Send + 'static, const N: usize> fmt::Pointer for Handle<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.addr, f)
    }
}

impl<T: Send + 'static, const N: usize> fmt::Debug for Handle<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("addr", &self.addr)
            .field("is_array", &self.is_array)
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Send + 'static, const N: usize> fmt::Display for Handle<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:p})", self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_size() {
        // Address plus cached shape and generation
        assert!(std::mem::size_of::<Handle<u64>>() <= 4 * std::mem::size_of::<usize>());
    }

    #[test]
    fn test_handle_new_and_deref() {
        struct Local(i32);

        let handle = Handle::new(Local(42));
        assert_eq!(handle.0, 42);
        assert_eq!(handle.ref_count(), 1);
        assert!(!handle.is_array());
        assert_eq!(handle.len(), 1);
        assert_eq!(Handle::<Local>::registry_size(), 1);

        drop(handle);
        assert_eq!(Handle::<Local>::registry_size(), 0);
    }

    #[test]
    fn test_handle_clone_shares_record() {
        struct Local(#[allow(dead_code)] u8);

        let a = Handle::new(Local(1));
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.ref_count(), 2);
        assert_eq!(Handle::<Local>::registry_size(), 1);
    }

    #[test]
    fn test_null_handle() {
        struct Local;

        let handle = Handle::<Local>::null();
        assert!(handle.is_null());
        assert!(handle.get().is_none());
        assert!(handle.is_empty());
        assert_eq!(handle.begin(), handle.end());
        assert_eq!(handle.ref_count(), 1);
        assert_eq!(Handle::<Local>::registry_size(), 1);

        let other = Handle::<Local>::default();
        assert_eq!(handle.ref_count(), 2);
        assert_eq!(Handle::<Local>::registry_size(), 1);

        drop(other);
        drop(handle);
        assert_eq!(Handle::<Local>::registry_size(), 0);
    }

    #[test]
    #[should_panic(expected = "dereferenced a null Handle")]
    fn test_null_deref_panics() {
        struct Local(u8);

        let handle = Handle::<Local>::null();
        let _value = handle.0;
    }

    #[test]
    fn test_get_mut_requires_unique() {
        struct Local(u32);

        let mut a = Handle::new(Local(1));
        a.get_mut().unwrap().0 = 5;
        assert_eq!(a.0, 5);

        let b = a.clone();
        assert!(a.get_mut().is_none());
        drop(b);
        assert!(a.get_mut().is_some());
    }

    #[test]
    fn test_from_boxed_slice_length() {
        struct Local;

        let err = Handle::<Local, 3>::from_boxed_slice(vec![Local, Local].into_boxed_slice())
            .unwrap_err();
        assert_eq!(err, GcError::LengthMismatch { expected: 3, actual: 2 });

        let handle =
            Handle::<Local, 3>::from_boxed_slice(vec![Local, Local, Local].into_boxed_slice())
                .unwrap();
        assert!(handle.is_array());
        assert_eq!(handle.len(), 3);

        let single = Handle::<Local>::from_boxed_slice(vec![Local].into_boxed_slice()).unwrap();
        assert!(!single.is_array());
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_index_and_slice() {
        let handle = Handle::<u16, 4>::from_array([1, 2, 3, 4]);
        assert_eq!(handle[2], 3);
        assert_eq!(handle.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(unsafe { *handle.get_unchecked(3) }, 4);
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_bounds_panics() {
        let handle = Handle::<u16, 2>::from_array([1, 2]);
        let _value = handle[2];
    }

    #[test]
    fn test_pointer_formatting() {
        struct Local;

        let handle = Handle::new(Local);
        assert_eq!(format!("{:p}", handle), format!("{:p}", handle.as_ptr()));
        assert!(handle.to_string().starts_with("Handle(0x"));
    }
}
