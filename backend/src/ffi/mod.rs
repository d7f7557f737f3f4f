//! Python binding
//!
//! Exposes `run_simulations` taking plain dicts, so Python callers can drive
//! the engine without any wrapper classes.

pub mod engine;
pub mod types;
