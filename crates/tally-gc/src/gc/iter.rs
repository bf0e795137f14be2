//! Bounds-checked iterator over a handle's elements
//!
//! A `GcIter` is a cursor over the region `[lower, upper)` addressed by a
//! handle. Positions are kept as element offsets from `lower`, so cursors may
//! move past either bound freely; only dereferencing is checked. Offset
//! arithmetic wraps, so an extreme offset yields an out-of-range cursor
//! rather than a panic.

use crate::{GcError, GcResult};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Random-access cursor over the elements of a handle
pub struct GcIter<'a, T> {
    lower: *const T,
    pos: isize,
    len: usize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> GcIter<'a, T> {
    /// Cursor at offset `pos` within `[lower, lower + len)`
    ///
    /// `lower` must address `len` initialized elements that outlive `'a`.
    pub(crate) fn new(lower: *const T, pos: isize, len: usize) -> Self {
        Self {
            lower,
            pos,
            len,
            _marker: PhantomData,
        }
    }

    /// Address of the current position
    #[inline]
    pub fn current(&self) -> *const T {
        self.lower.wrapping_offset(self.pos)
    }

    /// Address of the first element
    #[inline]
    pub fn lower(&self) -> *const T {
        self.lower
    }

    /// Address one past the last element
    #[inline]
    pub fn upper(&self) -> *const T {
        self.lower.wrapping_add(self.len)
    }

    /// Offset of the current position from `lower`
    #[inline]
    pub fn position(&self) -> isize {
        self.pos
    }

    /// Number of elements in the region
    #[inline]
    pub fn region_len(&self) -> usize {
        self.len
    }

    /// Whether the current position can be dereferenced
    #[inline]
    pub fn in_bounds(&self) -> bool {
        self.pos >= 0 && (self.pos as usize) < self.len
    }

    /// Element at the current position
    pub fn get(&self) -> GcResult<&'a T> {
        if !self.in_bounds() {
            return Err(GcError::OutOfRange {
                index: self.pos,
                len: self.len,
            });
        }
        // SAFETY: in bounds of a live region of `len` elements.
        Ok(unsafe { &*self.lower.offset(self.pos) })
    }

    /// Element `offset` positions away from the current one
    pub fn at(&self, offset: isize) -> GcResult<&'a T> {
        (*self + offset).get()
    }

    fn same_region(&self, other: &Self) -> bool {
        self.lower == other.lower && self.len == other.len
    }
}

impl<T> Clone for GcIter<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GcIter<'_, T> {}

impl<T> Add<isize> for GcIter<'_, T> {
    type Output = Self;

    fn add(mut self, offset: isize) -> Self {
        self.pos = self.pos.wrapping_add(offset);
        self
    }
}

impl<T> Sub<isize> for GcIter<'_, T> {
    type Output = Self;

    fn sub(mut self, offset: isize) -> Self {
        self.pos = self.pos.wrapping_sub(offset);
        self
    }
}

impl<T> AddAssign<isize> for GcIter<'_, T> {
    fn add_assign(&mut self, offset: isize) {
        self.pos = self.pos.wrapping_add(offset);
    }
}

impl<T> SubAssign<isize> for GcIter<'_, T> {
    fn sub_assign(&mut self, offset: isize) {
        self.pos = self.pos.wrapping_sub(offset);
    }
}

/// Distance in elements between two cursors over the same region
impl<T> Sub for GcIter<'_, T> {
    type Output = isize;

    fn sub(self, other: Self) -> isize {
        debug_assert!(self.same_region(&other), "cursors over different regions");
        self.pos.wrapping_sub(other.pos)
    }
}

impl<T> PartialEq for GcIter<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.same_region(other) && self.pos == other.pos
    }
}

impl<T> Eq for GcIter<'_, T> {}

// Cursors over different regions are unordered.
impl<T> PartialOrd for GcIter<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.same_region(other) {
            Some(self.pos.cmp(&other.pos))
        } else {
            None
        }
    }
}

impl<'a, T> Iterator for GcIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let item = self.get().ok()?;
        self.pos += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.in_bounds() {
            self.len - self.pos as usize
        } else {
            0
        };
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for GcIter<'_, T> {}

impl<T> fmt::Debug for GcIter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcIter")
            .field("current", &self.current())
            .field("lower", &self.lower)
            .field("upper", &self.upper())
            .finish()
    }
}
