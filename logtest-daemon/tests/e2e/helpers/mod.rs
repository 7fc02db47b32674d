//! Shared E2E test helpers.

pub mod client;
pub mod config;
pub mod daemon;
