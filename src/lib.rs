//! vrouter - reactive virtual router
//!
//! Decision engine of a router-style SDN application: it sees the first
//! packet of each new flow, decides where the flow goes and installs
//! steering rules so later packets bypass the controller. Peering flows
//! towards external BGP speakers are provisioned from configuration.

pub mod config;
pub mod controller;
pub mod dataplane;
pub mod error;
pub mod platform;
pub mod protocol;
pub mod telemetry;

pub use error::{Error, Result};
