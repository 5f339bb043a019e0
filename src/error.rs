use thiserror::Error;

use crate::core::TaskStatus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation not registered: {0}")]
    UnregisteredOperation(String),

    #[error("Operation registered twice: {0}")]
    DuplicateOperation(String),

    #[error("Illegal task status transition from {from} to {to}")]
    IllegalTransition { from: TaskStatus, to: TaskStatus },

    #[error("No active operation for {action}")]
    NoActiveOperation { action: &'static str },

    #[error("No current event for {action}; call begin_as_event first")]
    NoCurrentEvent { action: &'static str },

    #[error("Operation {operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;
