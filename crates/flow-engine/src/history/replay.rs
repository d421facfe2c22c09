//! Session replay
//!
//! A `Replayer` rebuilds a session from its log against a fresh diagram and
//! a fresh history: commits are applied forward and committed again, undo
//! and redo entries call `History::undo`/`History::redo`. Every
//! `checkpoint_interval` entries the diagram save and both stacks are stored
//! as a zstd-compressed snapshot, so seeking backward restores the nearest
//! checkpoint and rolls forward from there.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::event::{Direction, HistoryEvent};
use super::session_log::{LogEntry, LogKind};
use super::stack::History;
use crate::config::EngineConfig;
use crate::diagram::Diagram;
use crate::error::{FlowError, Result};
use crate::registry::NodeRegistry;
use crate::save::DiagramSave;

/// Diagram and history state at one log position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub diagram: DiagramSave,
    pub undo: Vec<HistoryEvent>,
    pub redo: Vec<HistoryEvent>,
}

/// Compressed checkpoints keyed by log position
pub struct CheckpointStore {
    snapshots: BTreeMap<usize, Vec<u8>>,
    level: i32,
}

impl CheckpointStore {
    pub fn new(level: i32) -> Self {
        Self {
            snapshots: BTreeMap::new(),
            level,
        }
    }

    /// Store a checkpoint, replacing any at the same position
    pub fn save(&mut self, position: usize, checkpoint: &Checkpoint) -> Result<()> {
        let json = serde_json::to_vec(checkpoint)?;
        let compressed =
            zstd::encode_all(&json[..], self.level).map_err(|e| FlowError::Compression(e.to_string()))?;
        self.snapshots.insert(position, compressed);
        Ok(())
    }

    /// Latest checkpoint at or before `position`
    pub fn nearest(&self, position: usize) -> Option<(usize, Result<Checkpoint>)> {
        self.snapshots
            .range(..=position)
            .next_back()
            .map(|(at, compressed)| (*at, decompress(compressed)))
    }

    pub fn contains(&self, position: usize) -> bool {
        self.snapshots.contains_key(&position)
    }

    pub fn positions(&self) -> Vec<usize> {
        self.snapshots.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Total compressed size of all checkpoints
    pub fn compressed_size(&self) -> usize {
        self.snapshots.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

fn decompress(compressed: &[u8]) -> Result<Checkpoint> {
    let json = zstd::decode_all(compressed).map_err(|e| FlowError::Compression(e.to_string()))?;
    Ok(serde_json::from_slice(&json)?)
}

/// Rebuilds a session from its log
pub struct Replayer {
    entries: Vec<LogEntry>,
    position: usize,
    diagram: Diagram,
    history: History,
    checkpoints: CheckpointStore,
    interval: usize,
}

impl Replayer {
    pub fn new(registry: Arc<NodeRegistry>, config: EngineConfig, entries: Vec<LogEntry>) -> Result<Self> {
        let history = History::new(&config);
        let checkpoints = CheckpointStore::new(config.compression_level);
        let interval = config.checkpoint_interval;
        let diagram = Diagram::new(registry).with_config(config);
        let mut replayer = Self {
            entries,
            position: 0,
            diagram,
            history,
            checkpoints,
            interval,
        };
        replayer.save_checkpoint()?;
        Ok(replayer)
    }

    /// Number of entries applied so far
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.entries.len()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Apply the next entry; returns false at the end of the log
    pub fn step(&mut self) -> Result<bool> {
        let Some(entry) = self.entries.get(self.position) else {
            return Ok(false);
        };
        match entry.kind {
            LogKind::Commit => {
                let event = entry.data.as_ref().ok_or_else(|| {
                    FlowError::invalid_state(format!("log entry {} is a commit without an event", self.position))
                })?;
                event.apply(&mut self.diagram, Direction::Forward)?;
                self.history.commit(event.clone());
            }
            LogKind::Undo => {
                self.history.undo(&mut self.diagram)?;
            }
            LogKind::Redo => {
                self.history.redo(&mut self.diagram)?;
            }
        }
        self.position += 1;

        if self.interval > 0 && self.position % self.interval == 0 && !self.checkpoints.contains(self.position) {
            self.save_checkpoint()?;
        }
        Ok(true)
    }

    /// Move to a log position, restoring a checkpoint when moving backward
    pub fn seek(&mut self, position: usize) -> Result<()> {
        let target = position.min(self.entries.len());
        if target < self.position {
            let (at, checkpoint) = self
                .checkpoints
                .nearest(target)
                .ok_or_else(|| FlowError::invalid_state("no checkpoint at log start"))?;
            let checkpoint = checkpoint?;
            self.diagram.deserialize_diagram(&checkpoint.diagram)?;
            self.history.restore_stacks(checkpoint.undo, checkpoint.redo);
            self.position = at;
            log::debug!("restored checkpoint at {} for seek to {}", at, target);
        }
        while self.position < target {
            self.step()?;
        }
        Ok(())
    }

    /// Apply every remaining entry
    pub fn replay_all(&mut self) -> Result<&Diagram> {
        self.seek(self.entries.len())?;
        log::info!(
            "replayed {} log entries into '{}'",
            self.entries.len(),
            self.diagram.name()
        );
        Ok(&self.diagram)
    }

    fn save_checkpoint(&mut self) -> Result<()> {
        let checkpoint = Checkpoint {
            diagram: self.diagram.serialize_diagram(),
            undo: self.history.undo_stack(),
            redo: self.history.redo_stack(),
        };
        self.checkpoints.save(self.position, &checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::tests::test_registry;
    use crate::history::event::NodeOptionEvent;
    use crate::history::DiagramChange;
    use crate::types::Point;
    use serde_json::json;

    fn checkpoint(name: &str) -> Checkpoint {
        Checkpoint {
            diagram: DiagramSave {
                diagram_name: name.to_string(),
                ..Default::default()
            },
            undo: vec![DiagramChange::Pan { dx: 1.0, dy: 1.0 }.into()],
            redo: Vec::new(),
        }
    }

    #[test]
    fn test_checkpoint_store_nearest() {
        let mut store = CheckpointStore::new(3);
        store.save(0, &checkpoint("zero")).unwrap();
        store.save(4, &checkpoint("four")).unwrap();

        let (at, restored) = store.nearest(6).unwrap();
        assert_eq!(at, 4);
        assert_eq!(restored.unwrap(), checkpoint("four"));

        let (at, _) = store.nearest(3).unwrap();
        assert_eq!(at, 0);
        assert_eq!(store.positions(), vec![0, 4]);
        assert!(store.compressed_size() > 0);
    }

    /// Live session: create emit and pass, set pass.min twice, undo once
    fn session_log() -> (Vec<LogEntry>, DiagramSave) {
        let registry = test_registry();
        let config = EngineConfig::default();
        let mut diagram = Diagram::new(registry).with_config(config.clone());
        let mut history = History::new(&config);

        let emit = diagram.create_node_at("emit", Point::new(0.0, 0.0)).unwrap();
        history.commit(DiagramChange::CreateNode(diagram.serialize_node(&emit).unwrap()).into());
        let pass = diagram.create_node_at("pass", Point::new(100.0, 0.0)).unwrap();
        history.commit(DiagramChange::CreateNode(diagram.serialize_node(&pass).unwrap()).into());
        let edge = diagram
            .connect(&crate::diagram::tests::out(&emit), &crate::diagram::tests::inp(&pass))
            .unwrap();
        let edge_save = diagram.edge(&edge).map(crate::save::EdgeSave::from).unwrap();
        history.commit(DiagramChange::CreateEdge(edge_save).into());

        for (prev, value) in [(0.0, 2.0), (2.0, 4.0)] {
            diagram.set_node_option(&pass, "min", json!(value)).unwrap();
            history.commit(NodeOptionEvent::new(pass.clone(), "min", json!(value), json!(prev)).into());
        }
        history.undo(&mut diagram).unwrap();

        (history.log().to_vec(), diagram.serialize_diagram())
    }

    #[test]
    fn test_replay_reproduces_session() {
        let (entries, expected) = session_log();
        let mut replayer = Replayer::new(test_registry(), EngineConfig::default(), entries).unwrap();
        let diagram = replayer.replay_all().unwrap();

        assert_eq!(
            diagram.serialize_diagram().to_json().unwrap(),
            expected.to_json().unwrap()
        );
        assert!(replayer.is_at_end());
        assert_eq!(replayer.history().undo_message(), Some("set min"));
        assert_eq!(replayer.history().redo_message(), Some("set min"));
    }

    #[test]
    fn test_seek_backward_uses_checkpoints() {
        let (entries, expected) = session_log();
        let mut config = EngineConfig::default();
        config.checkpoint_interval = 2;
        let mut replayer = Replayer::new(test_registry(), config, entries).unwrap();

        replayer.replay_all().unwrap();
        assert_eq!(replayer.checkpoints().positions(), vec![0, 2, 4, 6]);

        // After create, create, connect: min is still 0
        replayer.seek(3).unwrap();
        assert_eq!(replayer.position(), 3);
        assert_eq!(replayer.diagram().option_value("node-2", "min").unwrap(), json!(0.0));
        assert_eq!(replayer.diagram().edges().len(), 1);

        replayer.seek(0).unwrap();
        assert!(replayer.diagram().nodes().is_empty());

        replayer.seek(usize::MAX).unwrap();
        assert_eq!(replayer.diagram().serialize_diagram(), expected);
    }

    #[test]
    fn test_commit_without_event_is_rejected() {
        let entries = vec![LogEntry {
            kind: LogKind::Commit,
            timestamp: 0,
            data: None,
        }];
        let mut replayer = Replayer::new(test_registry(), EngineConfig::default(), entries).unwrap();
        assert!(matches!(replayer.step(), Err(FlowError::InvalidState(_))));
    }
}
