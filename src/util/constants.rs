// infrakit - util/constants.rs
//
// Single source of truth for named constants, limits, and defaults.

// =============================================================================
// Crate metadata
// =============================================================================

/// Crate display name.
pub const APP_NAME: &str = "infrakit";

/// Current crate version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default level for the crate's own diagnostics.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Log session
// =============================================================================

/// Extension of a session configuration file (`<name>.config`).
pub const SESSION_CONFIG_EXTENSION: &str = "config";

/// Default start marker: a rule of 41 dashes.
pub const DEFAULT_START_MARKER: &str = "-----------------------------------------";

/// Default end marker: a rule of 41 equals signs.
pub const DEFAULT_END_MARKER: &str = "=========================================";

/// Prefix of the entry written between the blank line and the end marker.
pub const STOPPING_PREFIX: &str = "Stopping: ";

/// Conversion pattern used when `[layout] pattern` is absent.
pub const DEFAULT_PATTERN: &str = "%d %-5p %t | %m%n";

/// Timestamp format for `%d` without an explicit `{format}`.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

// =============================================================================
// File appender rolling
// =============================================================================

/// File size at which a file appender rolls over.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB

/// Smallest accepted `max_file_size`; smaller values would roll on every entry.
pub const MIN_MAX_FILE_SIZE: u64 = 1024; // 1 KB

/// Number of rolled backups kept next to the active file.
pub const DEFAULT_MAX_BACKUPS: usize = 2;

/// Hard upper bound on `max_backups` (prevents configuration mistakes).
pub const ABSOLUTE_MAX_BACKUPS: usize = 100;
