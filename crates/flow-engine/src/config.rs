//! Engine configuration
//!
//! All fields have defaults, so a partial JSON document (or none at all)
//! yields a usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default values for [`EngineConfig`]
pub mod defaults {
    /// Maximum number of events kept on the undo stack
    pub const UNDO_LIMIT: usize = 100;
    /// Maximum recursion depth of a depth-first propagation walk
    pub const MAX_PROPAGATION_DEPTH: usize = 256;
    /// Number of log entries between replay checkpoints
    pub const CHECKPOINT_INTERVAL: usize = 32;
    /// zstd level used for replay checkpoints
    pub const COMPRESSION_LEVEL: i32 = 3;
}

/// Order in which downstream nodes are visited after an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationMode {
    /// Eager depth-first walk that prunes at nodes that need no update.
    /// A node reachable over several paths may be updated more than once.
    #[default]
    DepthFirst,
    /// Topological order over every reachable node, each visited once
    Topological,
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Undo stack capacity; the oldest entry is dropped past it
    pub undo_limit: usize,
    /// Propagation strategy
    pub propagation: PropagationMode,
    /// Depth limit for the depth-first walk
    pub max_propagation_depth: usize,
    /// Log entries between replay checkpoints (0 disables checkpoints)
    pub checkpoint_interval: usize,
    /// Check that committed events survive a serialization round trip
    pub verify_round_trip: bool,
    /// zstd compression level for checkpoints
    pub compression_level: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_limit: defaults::UNDO_LIMIT,
            propagation: PropagationMode::default(),
            max_propagation_depth: defaults::MAX_PROPAGATION_DEPTH,
            checkpoint_interval: defaults::CHECKPOINT_INTERVAL,
            verify_round_trip: true,
            compression_level: defaults::COMPRESSION_LEVEL,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&content)?;
        log::debug!("Loaded engine config from {:?}", path.as_ref());
        Ok(config)
    }

    /// Set the propagation strategy
    pub fn with_propagation(mut self, mode: PropagationMode) -> Self {
        self.propagation = mode;
        self
    }

    /// Set the undo stack capacity (at least 1)
    pub fn with_undo_limit(mut self, limit: usize) -> Self {
        self.undo_limit = limit.max(1);
        self
    }
}
