//! Typed errors for the configuration, persistence and state-machine layers.
//!
//! Service clients use `anyhow` instead; their failures never leave a tick.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("could not determine a {0} directory for this platform")]
    NoDirectory(&'static str),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state store json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejected lifecycle requests. The driver logs these; they never stop the loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("monitoring is already on")]
    AlreadyMonitoring,

    #[error("monitoring is not active")]
    NotActive,

    #[error("monitoring is not paused")]
    NotPaused,

    #[error("no task set")]
    EmptyTask,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
}
