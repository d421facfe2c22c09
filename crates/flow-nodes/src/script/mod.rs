//! Script nodes
//!
//! Nodes running user-authored expressions. Failures are reported on the
//! node and do not stop propagation elsewhere.

mod script_editor;

pub use script_editor::ScriptEditor;
