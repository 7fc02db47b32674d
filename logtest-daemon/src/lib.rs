//! logtest daemon library.
//!
//! Exposes the daemon's modules for integration testing.
//! In production, `logtest-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod dispatcher;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod server;
pub mod sessions;
