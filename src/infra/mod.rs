//! Infrastructure layer: config, console output, logging, and process hooks.

pub mod config;
pub mod console;
pub mod contracts;
pub mod error;
pub mod logging;
pub mod secrets;
pub mod stubs;

/// Returns the infra module name for smoke checks.
pub fn module_name() -> &'static str {
    "infra"
}
