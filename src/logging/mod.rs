// infrakit - logging/mod.rs
//
// Leveled log sessions: level routing, session config parsing, output
// targets, pattern layout, and the session lifecycle itself.
// Dependencies: util, tracing, tracing-subscriber, chrono, regex.
// Must NOT depend on: config.

pub mod appender;
pub mod layout;
pub mod level;
pub mod session;
pub mod settings;

pub use level::Level;
pub use session::{ErrorReport, LogSession};
