//! Reference-counted handles and sweep collection
//!
//! # Architecture
//!
//! - **AllocationRecord**: address, reference count, array shape and
//!   insertion generation of one tracked allocation
//! - **Registry**: address-keyed records for one (element type, array size)
//!   combination, plus collection statistics
//! - **global**: lazily created process-wide registry per combination, with
//!   an `atexit` hook that drains it
//! - **collector**: restart-on-removal sweep of zero-count records
//! - **Handle**: the smart pointer that adjusts counts on construction, clone,
//!   assignment and drop
//! - **GcIter**: bounds-checked cursor over a handle's elements
//!
//! # Lifecycle
//!
//! ```text
//! Handle::new ──► registry.retain_or_insert(addr)   count = 1
//! clone       ──► registry.retain_generation(addr)  count + 1
//! drop        ──► registry.release_generation(addr) count - 1
//!             └─► collector::collect                frees count == 0
//! exit hook   ──► collector::shutdown               counts forced to 0, swept
//! ```

pub mod collector;
pub mod global;
mod handle;
mod iter;
mod record;
mod registry;

pub use collector::GcStats;
pub use handle::Handle;
pub use iter::GcIter;
pub use record::AllocationRecord;
pub use registry::{Registry, RegistryCell};
