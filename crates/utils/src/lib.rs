//! Shared helpers for the harness binaries: tracing setup and build version.

pub mod logging;
pub mod version;
