//! Logging setup for the router application.

mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
