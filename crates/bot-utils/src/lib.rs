//! Shared utilities for quote-bot
//!
//! Logging setup and environment lookups used by the bot crate and its binary.

pub mod env;
pub mod logging;

pub use env::{EnvError, optional_env, require_env};
pub use logging::init_tracing;
