//! CLI error type

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read '{path}': {source}")]
    Io { path: String, source: io::Error },
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("Unknown resource kind '{0}'")]
    UnknownKind(String),
    #[error("Scenario references unknown node '{0}'")]
    UnknownNode(String),
    #[error("Duplicate node id '{0}' in scenario")]
    DuplicateNode(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
