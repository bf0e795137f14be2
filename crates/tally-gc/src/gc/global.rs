//! Process-wide registries
//!
//! One registry exists per (element type, fixed array size) combination. It
//! is created empty the first time the combination is used and lives for the
//! rest of the process. Creating it also registers an `atexit` hook (once per
//! combination) that drains whatever is still tracked at normal termination.

use super::collector;
use super::registry::{Registry, RegistryCell};
use crate::options::options;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};

type RegistryKey = (TypeId, usize);

static REGISTRIES: Lazy<Mutex<FxHashMap<RegistryKey, &'static (dyn Any + Send + Sync)>>> =
    Lazy::new(|| Mutex::new(FxHashMap::default()));

/// Registry for elements of type `T` with fixed array size `N`
pub fn registry<T: Send + 'static, const N: usize>() -> &'static RegistryCell<T> {
    let key = (TypeId::of::<T>(), N);
    let mut registries = REGISTRIES.lock();

    let entry = *registries.entry(key).or_insert_with(|| {
        let opts = options();
        let cell: &'static RegistryCell<T> = Box::leak(Box::new(Mutex::new(
            Registry::with_capacity(N, opts.initial_capacity),
        )));
        if opts.exit_hook {
            register_exit_hook::<T, N>();
        }
        cell as &'static (dyn Any + Send + Sync)
    });

    match entry.downcast_ref::<RegistryCell<T>>() {
        Some(cell) => cell,
        // Keys embed the TypeId, so a stored entry always has this type.
        None => unreachable!("registry type mismatch for {}", std::any::type_name::<T>()),
    }
}

/// Check whether the registry for a combination has been created
pub fn is_initialized<T: 'static, const N: usize>() -> bool {
    REGISTRIES.lock().contains_key(&(TypeId::of::<T>(), N))
}

/// Number of combinations with a live registry
pub fn registry_count() -> usize {
    REGISTRIES.lock().len()
}

fn register_exit_hook<T: Send + 'static, const N: usize>() {
    // SAFETY: `exit_hook` is a plain `extern "C"` function with no arguments.
    let rc = unsafe { libc::atexit(exit_hook::<T, N>) };
    if rc == 0 {
        log::debug!(
            "registered exit hook for registry<{}, {}>",
            std::any::type_name::<T>(),
            N
        );
    } else {
        log::warn!(
            "failed to register exit hook for registry<{}, {}>",
            std::any::type_name::<T>(),
            N
        );
    }
}

extern "C" fn exit_hook<T: Send + 'static, const N: usize>() {
    let result = std::panic::catch_unwind(|| {
        let cell = registry::<T, N>();
        // SAFETY: the process is terminating; no handle is dereferenced after
        // exit handlers start.
        unsafe { collector::shutdown(cell) };
    });
    if result.is_err() {
        log::error!(
            "exit hook for registry<{}, {}> panicked",
            std::any::type_name::<T>(),
            N
        );
    }
}
