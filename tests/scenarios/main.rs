//! Router scenarios against the in-memory platform
//!
//! Run with: cargo test --test scenarios

mod fabric;
mod forwarding;
mod peering;
