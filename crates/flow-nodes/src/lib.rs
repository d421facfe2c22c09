//! Flow Nodes
//!
//! Node kinds for the dataflow diagram engine. Every kind registers itself
//! with `inventory`, so `NodeRegistry::with_builtins()` sees all of them.
//!
//! # Categories
//!
//! - **Source**: Nodes that load data and start propagation
//! - **Filter**: Nodes that keep part of their input items
//! - **Set**: Nodes that combine subsets of one dataset
//! - **Output**: Nodes that show results
//! - **Flow**: Nodes that control how changes move downstream
//! - **Value**: Nodes that produce constants
//! - **Script**: Nodes that run user-authored expressions

pub mod filter;
pub mod flow;
pub mod output;
pub mod script;
pub mod set;
pub mod source;
pub mod value;

pub use filter::*;
pub use flow::*;
pub use output::*;
pub use script::*;
pub use set::*;
pub use source::*;
pub use value::*;

#[cfg(test)]
mod scenarios;
