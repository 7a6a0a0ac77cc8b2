// infrakit - util/mod.rs
//
// Utility modules: error types, named constants, diagnostics setup.
// No dependencies on the config or logging layers.

pub mod constants;
pub mod error;
pub mod logging;
