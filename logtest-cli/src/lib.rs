//! logtest CLI library.
//!
//! The `logtest` binary is a thin wrapper around these modules; they are
//! public so that integration tests can drive commands against a test socket.

pub mod cli;
pub mod client;
pub mod commands;
pub mod error;
pub mod output;
