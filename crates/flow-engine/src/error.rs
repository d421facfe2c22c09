//! Error types for the flow engine

use thiserror::Error;

/// Result type alias using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur in the flow engine
#[derive(Debug, Error)]
pub enum FlowError {
    /// A node required an upstream dataset that is absent or disconnected
    #[error("Missing dataset on node '{0}'")]
    MissingDataset(String),

    /// Attempted connection between incompatible ports
    #[error("Type mismatch: {reason}")]
    TypeMismatch { reason: String },

    /// A guarded getter was called without checking its guard first
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// User-authored logic failed inside a node
    #[error("Script error on node '{node}': {message}")]
    UserScript { node: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Node id not present in the diagram
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Port id not present on a node
    #[error("Node '{node}' has no {side} port '{port}'")]
    UnknownPort {
        node: String,
        port: String,
        side: String,
    },

    /// Edge id or endpoints not present in the diagram
    #[error("Unknown edge: {0}")]
    UnknownEdge(String),

    /// Node type not present in the registry
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Connection rejected by topology or capacity rules
    #[error("Cannot connect: {0}")]
    Connection(String),

    /// Option name not understood by a node kind
    #[error("Node type '{node_type}' has no option '{option}'")]
    UnknownOption { node_type: String, option: String },

    /// Option value could not be decoded
    #[error("Invalid value for option '{option}': {message}")]
    InvalidOption { option: String, message: String },

    /// A saved diagram failed validation
    #[error("Invalid diagram: {0}")]
    InvalidDiagram(String),

    /// Session log key not usable as a storage path
    #[error("Invalid log key: {0}")]
    InvalidLogKey(String),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Create an invalid-state error and report it loudly.
    ///
    /// Invalid state means a node broke its own contract, so it is logged at
    /// error level in addition to being returned.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("contract violation: {}", msg);
        Self::InvalidState(msg)
    }

    /// Create a user script error for a node
    pub fn user_script(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UserScript {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create an unknown option error for a node kind
    pub fn unknown_option(node_type: impl Into<String>, option: impl Into<String>) -> Self {
        Self::UnknownOption {
            node_type: node_type.into(),
            option: option.into(),
        }
    }

    /// Create an invalid option error from any displayable cause
    pub fn invalid_option(option: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::InvalidOption {
            option: option.into(),
            message: message.to_string(),
        }
    }
}
