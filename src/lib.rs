// infrakit - lib.rs
//
// Library entry point.
//
// - `config`: typed TOML document load/save
// - `logging`: leveled, file-backed log sessions
// - `util`: error types, named constants, diagnostics setup

pub mod config;
pub mod logging;
pub mod util;

pub use config::ConfigDocument;
pub use logging::{Level, LogSession};
pub use util::error::{ConfigError, InfraError, SessionError};
