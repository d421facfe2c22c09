//! Event-sourced edit history
//!
//! - `event`: history events and the `HistoryTarget` they apply to
//! - `stack`: undo/redo stacks with toggle cancellation
//! - `session_log`: the append-only session log
//! - `replay`: rebuilding a session from its log, with compressed
//!   checkpoints for seeking

mod event;
mod session_log;
mod replay;
mod stack;

pub use event::{
    BatchEvent, DiagramChange, DiagramEvent, Direction, HistoryEvent, HistoryTarget, NodeOptionEvent,
};
pub use session_log::{logs_from_json, logs_to_json, read_logs, write_logs, LogEntry, LogKind};
pub use replay::{Checkpoint, CheckpointStore, Replayer};
pub use stack::History;

use serde_json::Value;

use crate::diagram::Diagram;
use crate::error::Result;

impl HistoryTarget for Diagram {
    fn apply_node_option(&mut self, node: &str, option: &str, value: Value) -> Result<()> {
        self.set_node_option(node, option, value)
    }

    fn apply_diagram_change(&mut self, change: &DiagramChange, direction: Direction) -> Result<()> {
        use Direction::{Backward, Forward};
        match (change, direction) {
            (DiagramChange::CreateNode(save), Forward) | (DiagramChange::RemoveNode(save), Backward) => {
                self.create_node_from_save(save)?;
            }
            (DiagramChange::CreateNode(save), Backward) | (DiagramChange::RemoveNode(save), Forward) => {
                self.remove_node(&save.id)?;
            }
            (DiagramChange::CreateEdge(edge), Forward) | (DiagramChange::RemoveEdge(edge), Backward) => {
                self.connect(&edge.source(), &edge.target())?;
            }
            (DiagramChange::CreateEdge(edge), Backward) | (DiagramChange::RemoveEdge(edge), Forward) => {
                self.disconnect(&edge.source(), &edge.target())?;
            }
            (DiagramChange::Pan { dx, dy }, Forward) => self.pan(*dx, *dy),
            (DiagramChange::Pan { dx, dy }, Backward) => self.pan(-dx, -dy),
            (DiagramChange::MoveNode { node, to, .. }, Forward) => {
                self.move_node(node, *to)?;
            }
            (DiagramChange::MoveNode { node, from, .. }, Backward) => {
                self.move_node(node, *from)?;
            }
            (DiagramChange::SetLabel { node, to, .. }, Forward) => {
                self.set_node_label(node, to.as_str())?;
            }
            (DiagramChange::SetLabel { node, from, .. }, Backward) => {
                self.set_node_label(node, from.as_str())?;
            }
        }
        Ok(())
    }
}
