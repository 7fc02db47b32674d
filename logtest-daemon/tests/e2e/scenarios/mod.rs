//! E2E test scenarios.

mod framing;
mod lifecycle;
mod session_flow;
