use thiserror::Error;
use uuid::Uuid;

/// Script load failures. Any of these aborts the whole load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Malformed script: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported script version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("Unknown command type '{tag}' at {path}")]
    UnknownCommand { tag: String, path: String },
    #[error("Invalid settings for {tag} at {path}: {source}")]
    Settings {
        tag: String,
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Validation failed for {tag} at {path}: {}", messages.join("; "))]
    Validation {
        tag: String,
        path: String,
        messages: Vec<String>,
    },
    #[error("{tag} at {path} has no block named '{block}'")]
    UnknownBlock {
        tag: String,
        path: String,
        block: String,
    },
    #[error("Command id {id} at {path} is already used by another command")]
    DuplicateId { id: Uuid, path: String },
}

/// Condition evaluation failures. Mapped to `ControlFlow::Error` at the node.
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),
    #[error("'{value}' is not a number (operator {operator})")]
    NotNumeric { value: String, operator: String },
    #[error("{0}")]
    Parse(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("No command with id {0}")]
    NodeNotFound(Uuid),
    #[error("Command {id} has no block named '{block}'")]
    BlockNotFound { id: Uuid, block: String },
    #[error("Cannot replace {expected} settings with {found} settings")]
    TypeMismatch { expected: String, found: String },
    #[error("Index {index} is out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Cannot move a command into its own block")]
    IntoOwnDescendant,
    #[error("A command with id {0} is already in the script")]
    DuplicateId(Uuid),
}

#[derive(Debug, Error, PartialEq)]
pub enum ListingError {
    #[error("Line {line}: end marker without a matching start")]
    UnbalancedEnd { line: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed settings file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not find a directory for log export")]
    NoLogDirectory,
}
