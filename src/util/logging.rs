// infrakit - util/logging.rs
//
// Diagnostics for the crate itself (config load/save, appender rolling,
// session lifecycle). These go to whatever subscriber the host installed;
// log sessions never use it, they own their own dispatcher.
//
// Output: stderr. Never logs document contents at any level.

use tracing_subscriber::EnvFilter;

/// Install a compact stderr subscriber for the crate's diagnostics.
///
/// `debug_flag` forces the `debug` level.
/// `config_level` is a level taken from the host's own configuration.
///
/// Priority: debug flag > config level > default "info".
/// Returns `false` when a global subscriber was already installed.
pub fn init(debug_flag: bool, config_level: Option<&str>) -> bool {
    let filter = if debug_flag {
        EnvFilter::new("debug")
    } else if let Some(level) = config_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(super::constants::DEFAULT_LOG_LEVEL)
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            app = super::constants::APP_NAME,
            version = super::constants::APP_VERSION,
            "Diagnostics initialised"
        );
    }
    installed
}
