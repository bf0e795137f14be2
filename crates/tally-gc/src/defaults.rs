//! Default constants for collector configuration.

/// Collect immediately after a handle drop releases its reference.
pub const DEFAULT_COLLECT_ON_RELEASE: bool = true;

/// Register an `atexit` hook that drains each registry at process exit.
pub const DEFAULT_EXIT_HOOK: bool = true;

/// Initial record capacity reserved by a freshly created registry.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Environment variable overriding `collect_on_release`.
pub const ENV_COLLECT_ON_RELEASE: &str = "TALLY_GC_COLLECT_ON_RELEASE";

/// Environment variable overriding `exit_hook`.
pub const ENV_EXIT_HOOK: &str = "TALLY_GC_EXIT_HOOK";

/// Environment variable overriding `initial_capacity`.
pub const ENV_INITIAL_CAPACITY: &str = "TALLY_GC_INITIAL_CAPACITY";

/// Placeholder printed for a null address in registry listings.
pub const NULL_VALUE_PLACEHOLDER: &str = "---";
