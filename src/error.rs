use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid configuration: {}", .errors.join("; "))]
    InvalidConfig { errors: Vec<String> },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("intent service error: {0}")]
    Intent(String),

    #[error("controller has stopped")]
    ControllerStopped,
}

pub type Result<T> = std::result::Result<T, Error>;
