//! Undo and redo stacks

use std::collections::VecDeque;
use std::sync::Arc;

use super::event::{Direction, HistoryEvent, HistoryTarget};
use super::session_log::LogEntry;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::{emit, EngineEvent, EventSink, NullEventSink};

/// Linear undo/redo history with an append-only log
///
/// Committing clears the redo stack. Undo and redo move events between the
/// stacks and apply them to a `HistoryTarget`; neither clears the other
/// stack. Every commit, undo and redo is appended to the log.
pub struct History {
    undo: VecDeque<HistoryEvent>,
    redo: Vec<HistoryEvent>,
    log: Vec<LogEntry>,
    log_position: usize,
    undo_limit: usize,
    verify_round_trip: bool,
    sink: Arc<dyn EventSink>,
}

impl History {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            log: Vec::new(),
            log_position: 0,
            undo_limit: config.undo_limit.max(1),
            verify_round_trip: config.verify_round_trip,
            sink: Arc::new(NullEventSink),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Record an event that was already applied
    pub fn commit(&mut self, event: HistoryEvent) {
        if self.verify_round_trip {
            verify_round_trip(&event);
        }
        log::debug!("commit '{}'", event.message());
        self.log.push(LogEntry::commit(event.clone()));
        self.log_position = self.log.len();

        self.undo.push_back(event);
        self.cancel_toggles();
        self.redo.clear();
        while self.undo.len() > self.undo_limit {
            self.undo.pop_front();
        }
        self.notify();
    }

    /// Drop the two most recent events if the second undoes the first
    fn cancel_toggles(&mut self) {
        let len = self.undo.len();
        if len < 2 {
            return;
        }
        if self.undo[len - 1].cancels(&self.undo[len - 2]) {
            log::debug!("cancelled toggle pair '{}'", self.undo[len - 1].message());
            self.undo.truncate(len - 2);
        }
    }

    /// Undo the latest event; returns false when there is nothing to undo
    pub fn undo(&mut self, target: &mut dyn HistoryTarget) -> Result<bool> {
        let Some(event) = self.undo.pop_back() else {
            return Ok(false);
        };
        if let Err(e) = event.apply(target, Direction::Backward) {
            log::error!("undo of '{}' failed: {}", event.message(), e);
            self.undo.push_back(event);
            return Err(e);
        }
        log::debug!("undo '{}'", event.message());
        self.redo.push(event);
        self.log.push(LogEntry::undo());
        self.log_position = self.log.len();
        self.notify();
        Ok(true)
    }

    /// Redo the latest undone event; returns false when there is nothing to
    /// redo
    pub fn redo(&mut self, target: &mut dyn HistoryTarget) -> Result<bool> {
        let Some(event) = self.redo.pop() else {
            return Ok(false);
        };
        if let Err(e) = event.apply(target, Direction::Forward) {
            log::error!("redo of '{}' failed: {}", event.message(), e);
            self.redo.push(event);
            return Err(e);
        }
        log::debug!("redo '{}'", event.message());
        self.undo.push_back(event);
        self.log.push(LogEntry::redo());
        self.log_position = self.log.len();
        self.notify();
        Ok(true)
    }

    /// Undo up to `k` events; returns how many were undone
    pub fn undo_events(&mut self, target: &mut dyn HistoryTarget, k: usize) -> Result<usize> {
        let mut done = 0;
        while done < k && self.undo(target)? {
            done += 1;
        }
        Ok(done)
    }

    /// Redo up to `k` events; returns how many were redone
    pub fn redo_events(&mut self, target: &mut dyn HistoryTarget, k: usize) -> Result<usize> {
        let mut done = 0;
        while done < k && self.redo(target)? {
            done += 1;
        }
        Ok(done)
    }

    pub fn undo_message(&self) -> Option<&str> {
        self.undo.back().map(HistoryEvent::message)
    }

    pub fn redo_message(&self) -> Option<&str> {
        self.redo.last().map(HistoryEvent::message)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Undo stack, oldest first
    pub fn undo_stack(&self) -> Vec<HistoryEvent> {
        self.undo.iter().cloned().collect()
    }

    /// Redo stack, oldest first
    pub fn redo_stack(&self) -> Vec<HistoryEvent> {
        self.redo.clone()
    }

    /// Replace both stacks; the log is left untouched
    pub fn restore_stacks(&mut self, undo: Vec<HistoryEvent>, redo: Vec<HistoryEvent>) {
        self.undo = undo.into();
        self.redo = redo;
        self.notify();
    }

    /// Clear both stacks; the log is left untouched
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.notify();
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Position in the log after the latest recorded action
    pub fn log_position(&self) -> usize {
        self.log_position
    }

    fn notify(&self) {
        emit(
            self.sink.as_ref(),
            EngineEvent::HistoryChanged {
                undo_message: self.undo_message().map(str::to_string),
                redo_message: self.redo_message().map(str::to_string),
            },
        );
    }
}

/// Log an event that does not survive serialization unchanged
fn verify_round_trip(event: &HistoryEvent) {
    let result = serde_json::to_string(event)
        .and_then(|json| serde_json::from_str::<HistoryEvent>(&json));
    match result {
        Ok(back) if &back == event => {}
        Ok(_) => log::error!("history event '{}' changes on round trip", event.message()),
        Err(e) => log::error!("history event '{}' is not serializable: {}", event.message(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VecEventSink;
    use crate::history::event::tests::Recorder;
    use crate::history::event::NodeOptionEvent;
    use crate::history::session_log::LogKind;
    use serde_json::{json, Value};

    fn set(option: &str, value: Value, prev: Value) -> HistoryEvent {
        NodeOptionEvent::new("node-1", option, value, prev).into()
    }

    #[test]
    fn test_undo_redo_order() {
        let mut history = History::new(&EngineConfig::default());
        let mut target = Recorder::default();
        history.commit(set("column", json!(2), Value::Null));
        history.commit(set("column", json!(5), json!(2)));

        assert_eq!(history.undo_events(&mut target, 2).unwrap(), 2);
        assert!(!history.can_undo());
        assert_eq!(history.redo_events(&mut target, 5).unwrap(), 2);
        assert_eq!(
            target.calls,
            vec![
                "node-1.column=2",
                "node-1.column=null",
                "node-1.column=2",
                "node-1.column=5"
            ]
        );
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut history = History::new(&EngineConfig::default());
        let mut target = Recorder::default();
        history.commit(set("min", json!(1), json!(0)));
        history.undo(&mut target).unwrap();
        assert!(history.can_redo());
        assert_eq!(history.redo_message(), Some("set min"));

        history.commit(set("max", json!(9), json!(0)));
        assert!(!history.can_redo());
        assert_eq!(history.undo_message(), Some("set max"));
    }

    #[test]
    fn test_undo_does_not_clear_redo() {
        let mut history = History::new(&EngineConfig::default());
        let mut target = Recorder::default();
        history.commit(set("a", json!(1), json!(0)));
        history.commit(set("b", json!(1), json!(0)));
        history.undo(&mut target).unwrap();
        history.undo(&mut target).unwrap();
        assert_eq!(history.redo_stack().len(), 2);
        assert!(!history.undo(&mut target).unwrap());
    }

    #[test]
    fn test_toggles_cancel() {
        let mut history = History::new(&EngineConfig::default());
        history.commit(set("min", json!(3), json!(0)));
        history.commit(set("flag", json!(true), json!(false)));
        history.commit(set("flag", json!(false), json!(true)));

        assert_eq!(history.undo_stack().len(), 1);
        assert_eq!(history.undo_message(), Some("set min"));
        // The log keeps every commit
        assert_eq!(history.log().len(), 3);
    }

    #[test]
    fn test_undo_limit_drops_oldest() {
        let mut history = History::new(&EngineConfig::default().with_undo_limit(2));
        for i in 0..4 {
            history.commit(set("min", json!(i + 1), json!(i)));
        }
        let stack = history.undo_stack();
        assert_eq!(stack.len(), 2);
        match &stack[0] {
            HistoryEvent::Node(e) => assert_eq!(e.value, json!(3)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_log_entries_and_position() {
        let mut history = History::new(&EngineConfig::default());
        let mut target = Recorder::default();
        history.commit(set("min", json!(1), json!(0)));
        history.undo(&mut target).unwrap();
        history.redo(&mut target).unwrap();

        let kinds: Vec<LogKind> = history.log().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![LogKind::Commit, LogKind::Undo, LogKind::Redo]);
        assert_eq!(history.log_position(), 3);

        history.clear();
        assert!(!history.can_undo());
        assert_eq!(history.log().len(), 3);
    }

    #[test]
    fn test_history_changed_events() {
        let sink = Arc::new(VecEventSink::new());
        let mut history = History::new(&EngineConfig::default()).with_event_sink(sink.clone());
        history.commit(set("min", json!(1), json!(0)));

        let events = sink.events();
        assert!(matches!(
            events.last(),
            Some(EngineEvent::HistoryChanged { undo_message: Some(m), redo_message: None }) if m == "set min"
        ));
    }
}
