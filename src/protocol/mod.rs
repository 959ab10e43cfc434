//! Wire-level protocol handling
//!
//! Just enough L2/L3 parsing to classify reactive packets and answer ARP.

pub mod arp;
pub mod ethernet;
pub mod ipv4;
pub mod types;

pub use types::*;
