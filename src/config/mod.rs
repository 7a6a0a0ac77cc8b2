// infrakit - config/mod.rs
//
// Typed configuration document persistence.
// Dependencies: util, serde, toml.
// Must NOT depend on: logging.

pub mod store;

pub use store::{load, save, save_with, ConfigDocument};
