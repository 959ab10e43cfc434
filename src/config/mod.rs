//! Configuration management
//!
//! Handles the router block of the netcfg JSON export and the controller
//! settings file (settings.toml).

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::{Error, Result};
use std::path::Path;

/// Load the router block from a netcfg JSON file
///
/// `Ok(None)` when the file has no block for this application.
pub fn load_netcfg<P: AsRef<Path>>(path: P) -> Result<Option<RouterConfigDoc>> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let document: NetcfgDocument = serde_json::from_str(&content)?;
    document.router_config()
}

/// Load controller settings from a TOML file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}
