//! Domain layer: resource identities, deployment requests, and run lifecycle.

pub mod deployment;
pub mod lifecycle;
pub mod resource;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
