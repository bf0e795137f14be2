//! Collector configuration
//!
//! Options are process-wide. They are either installed explicitly with
//! [`configure`] before the first handle is created, or read lazily from the
//! environment on first use:
//!
//! - `TALLY_GC_COLLECT_ON_RELEASE`: `true`/`false`
//! - `TALLY_GC_EXIT_HOOK`: `true`/`false`
//! - `TALLY_GC_INITIAL_CAPACITY`: record capacity of new registries

use crate::defaults::{
    DEFAULT_COLLECT_ON_RELEASE, DEFAULT_EXIT_HOOK, DEFAULT_INITIAL_CAPACITY,
    ENV_COLLECT_ON_RELEASE, ENV_EXIT_HOOK, ENV_INITIAL_CAPACITY,
};
use crate::{GcError, GcResult};
use once_cell::sync::OnceCell;

static OPTIONS: OnceCell<GcOptions> = OnceCell::new();

/// Process-wide collector options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcOptions {
    /// Run a collection from `Handle::drop` after releasing the reference
    pub collect_on_release: bool,

    /// Register an `atexit` hook per registry that drains it at exit
    pub exit_hook: bool,

    /// Record capacity reserved by a new registry
    pub initial_capacity: usize,
}

impl Default for GcOptions {
    fn default() -> Self {
        Self {
            collect_on_release: DEFAULT_COLLECT_ON_RELEASE,
            exit_hook: DEFAULT_EXIT_HOOK,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl GcOptions {
    /// Set whether dropping a handle triggers a collection
    pub fn with_collect_on_release(mut self, enabled: bool) -> Self {
        self.collect_on_release = enabled;
        self
    }

    /// Set whether registries drain themselves at process exit
    pub fn with_exit_hook(mut self, enabled: bool) -> Self {
        self.exit_hook = enabled;
        self
    }

    /// Set the initial record capacity of new registries
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Load options from the process environment, starting from defaults
    pub fn from_env() -> GcResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load options through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> GcResult<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(raw) = lookup(ENV_COLLECT_ON_RELEASE) {
            options.collect_on_release = parse_bool(ENV_COLLECT_ON_RELEASE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_EXIT_HOOK) {
            options.exit_hook = parse_bool(ENV_EXIT_HOOK, &raw)?;
        }
        if let Some(raw) = lookup(ENV_INITIAL_CAPACITY) {
            options.initial_capacity = raw.trim().parse().map_err(|_| GcError::InvalidOption {
                name: ENV_INITIAL_CAPACITY,
                value: raw.clone(),
            })?;
        }

        Ok(options)
    }
}

fn parse_bool(name: &'static str, raw: &str) -> GcResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GcError::InvalidOption {
            name,
            value: raw.to_string(),
        }),
    }
}

/// Install process-wide options
///
/// Fails with [`GcError::AlreadyConfigured`] once options have been installed
/// or read by any handle.
pub fn configure(options: GcOptions) -> GcResult<()> {
    OPTIONS.set(options).map_err(|_| GcError::AlreadyConfigured)
}

/// Current process-wide options, loading them from the environment on first use
pub fn options() -> &'static GcOptions {
    OPTIONS.get_or_init(|| match GcOptions::from_env() {
        Ok(options) => options,
        Err(err) => {
            log::warn!("{}; falling back to default collector options", err);
            GcOptions::default()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = GcOptions::default();
        assert!(options.collect_on_release);
        assert!(options.exit_hook);
        assert_eq!(options.initial_capacity, DEFAULT_INITIAL_CAPACITY);
    }

    #[test]
    fn test_from_lookup_empty() {
        let options = GcOptions::from_lookup(lookup_in(&[])).unwrap();
        assert_eq!(options, GcOptions::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let options = GcOptions::from_lookup(lookup_in(&[
            (ENV_COLLECT_ON_RELEASE, "off"),
            (ENV_EXIT_HOOK, "0"),
            (ENV_INITIAL_CAPACITY, " 64 "),
        ]))
        .unwrap();

        assert!(!options.collect_on_release);
        assert!(!options.exit_hook);
        assert_eq!(options.initial_capacity, 64);
    }

    #[test]
    fn test_from_lookup_invalid_bool() {
        let err = GcOptions::from_lookup(lookup_in(&[(ENV_EXIT_HOOK, "sometimes")])).unwrap_err();
        assert_eq!(
            err,
            GcError::InvalidOption {
                name: ENV_EXIT_HOOK,
                value: "sometimes".to_string(),
            }
        );
    }

    #[test]
    fn test_from_lookup_invalid_capacity() {
        let err =
            GcOptions::from_lookup(lookup_in(&[(ENV_INITIAL_CAPACITY, "-3")])).unwrap_err();
        assert!(matches!(err, GcError::InvalidOption { name, .. } if name == ENV_INITIAL_CAPACITY));
    }

    #[test]
    fn test_builder_setters() {
        let options = GcOptions::default()
            .with_collect_on_release(false)
            .with_exit_hook(false)
            .with_initial_capacity(2);
        assert!(!options.collect_on_release);
        assert!(!options.exit_hook);
        assert_eq!(options.initial_capacity, 2);
    }
}
