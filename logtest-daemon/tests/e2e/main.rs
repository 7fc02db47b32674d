//! E2E integration tests for logtest-daemon.
//!
//! These tests start the daemon on a Unix socket in a temporary directory
//! and talk to it with the length-prefixed framing real clients use.
//!
//! # Test Structure
//!
//! - `helpers/` -- Shared test utilities (config builder, daemon handle, client)
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p logtest-daemon --test e2e
//! ```

mod helpers;
mod scenarios;
