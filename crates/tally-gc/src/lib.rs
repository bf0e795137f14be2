//! Tally: reference-counted handles with deferred sweep collection
//!
//! This crate provides:
//! - `Handle<T, N>`: a shared smart pointer over a heap-allocated object or
//!   fixed-size array
//! - A process-wide registry per (element type, array size) combination
//!   holding one allocation record per tracked address
//! - A sweep collector that frees allocations whose count dropped to zero
//! - A bounds-checked iterator over the region a handle addresses
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_gc::Handle;
//!
//! let a = Handle::new(42i32);
//! let b = a.clone();
//! assert_eq!(a.ref_count(), 2);
//! drop(b);
//! drop(a); // freed here
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod defaults;
pub mod gc;
pub mod options;

pub use gc::{AllocationRecord, GcIter, GcStats, Handle, Registry, RegistryCell};
pub use options::{configure, options, GcOptions};

/// Errors reported by registries, iterators and configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GcError {
    /// The address has no record in the registry
    #[error("address {address:#x} is not tracked by this registry")]
    Untracked {
        /// Raw address that was looked up
        address: usize,
    },

    /// Decrement of a record whose count is already zero
    #[error("reference count underflow for address {address:#x}")]
    CountUnderflow {
        /// Raw address of the record
        address: usize,
    },

    /// A record for the address already exists
    #[error("address {address:#x} is already tracked")]
    AlreadyTracked {
        /// Raw address of the duplicate
        address: usize,
    },

    /// Increment of a record whose count is already at its maximum
    #[error("reference count overflow for address {address:#x}")]
    CountOverflow {
        /// Raw address of the record
        address: usize,
    },

    /// The address is tracked, but by a record created after the handle's
    #[error("stale handle for address {address:#x} (generation {generation}, current {current})")]
    StaleGeneration {
        /// Raw address that was looked up
        address: usize,
        /// Generation cached by the handle
        generation: u64,
        /// Generation of the record now tracking the address
        current: u64,
    },

    /// Iterator dereference outside `[lower, upper)`
    #[error("iterator position {index} out of range for region of {len} elements")]
    OutOfRange {
        /// Offset from the lower bound
        index: isize,
        /// Number of dereferenceable elements
        len: usize,
    },

    /// Boxed slice length differs from the handle's fixed array size
    #[error("expected {expected} elements, got {actual}")]
    LengthMismatch {
        /// Fixed array size of the handle type
        expected: usize,
        /// Length of the supplied slice
        actual: usize,
    },

    /// Options were installed after they had already been read
    #[error("collector options are already configured")]
    AlreadyConfigured,

    /// An environment option could not be parsed
    #[error("invalid value {value:?} for {name}")]
    InvalidOption {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
}

/// Result alias used throughout the crate
pub type GcResult<T> = Result<T, GcError>;
