//! Propagation walk
//!
//! After an edit, the nodes that must react are started and the walk moves
//! forward through the diagram. A node is updated when it was edited
//! directly (forced) or when its `is_update_necessary` check holds; a node
//! that needs no update ends its branch. Once the walk is done, the update
//! and connection flags of every node it touched are cleared.
//!
//! Two strategies are available through `EngineConfig::propagation`:
//!
//! - depth-first: recurse from every updated node into the nodes connected to
//!   its updated outputs. Diamonds may update a shared node more than once.
//! - topological: order every reachable node once and visit it in that
//!   order.

use std::collections::HashSet;

use crate::config::PropagationMode;
use crate::diagram::Diagram;
use crate::error::FlowError;
use crate::events::{emit, EngineEvent};
use crate::node::NodeContext;
use crate::types::{NodeId, PortSide};

/// Where a walk starts
#[derive(Debug, Default)]
pub(crate) struct Propagation {
    /// Nodes updated unconditionally
    pub forced: Vec<NodeId>,
    /// Nodes updated only if their inputs changed
    pub checked: Vec<NodeId>,
    /// Nodes with flags to clear that are not walked from
    pub touched: Vec<NodeId>,
}

impl Propagation {
    pub fn forced(node: impl Into<String>) -> Self {
        Self {
            forced: vec![node.into()],
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct Walk {
    touched: Vec<NodeId>,
    updated: Vec<NodeId>,
    skipped: Vec<NodeId>,
}

impl Walk {
    fn touch(&mut self, id: &str) {
        if !self.touched.iter().any(|t| t == id) {
            self.touched.push(id.to_string());
        }
    }
}

impl Diagram {
    /// Run a propagation walk with the configured strategy
    pub(crate) fn propagate(&mut self, start: Propagation) {
        let mode = self.config.propagation;
        self.propagate_with(mode, start);
    }

    pub(crate) fn propagate_with(&mut self, mode: PropagationMode, start: Propagation) {
        let mut walk = Walk::default();
        match mode {
            PropagationMode::DepthFirst => self.walk_depth_first(&start, &mut walk),
            PropagationMode::Topological => self.walk_topological(&start, &mut walk),
        }
        for id in &start.touched {
            walk.touch(id);
        }
        self.finish_walk(&start, walk);
    }

    fn walk_depth_first(&mut self, start: &Propagation, walk: &mut Walk) {
        for id in &start.forced {
            if self.index_of(id).is_none() {
                continue;
            }
            walk.touch(id);
            self.run_update(id);
            walk.updated.push(id.clone());
            self.propagate_node(id, 1, walk);
        }
        for id in &start.checked {
            self.visit(id, 1, walk);
        }
    }

    fn visit(&mut self, id: &str, depth: usize, walk: &mut Walk) {
        if self.index_of(id).is_none() {
            return;
        }
        walk.touch(id);
        if self.is_update_necessary(id) {
            self.run_update(id);
            walk.updated.push(id.to_string());
            self.propagate_node(id, depth + 1, walk);
        } else {
            log::debug!("skip {}: no input changed", id);
            walk.skipped.push(id.to_string());
        }
    }

    fn propagate_node(&mut self, id: &str, depth: usize, walk: &mut Walk) {
        if depth > self.config.max_propagation_depth {
            log::warn!(
                "propagation from {} cut at depth {}",
                id,
                self.config.max_propagation_depth
            );
            return;
        }
        for next in self.updated_downstream(id) {
            self.visit(&next, depth, walk);
        }
    }

    fn walk_topological(&mut self, start: &Propagation, walk: &mut Walk) {
        let origins: Vec<NodeId> = start.forced.iter().chain(start.checked.iter()).cloned().collect();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut order: Vec<NodeId> = Vec::new();
        for id in &origins {
            self.post_order(id, &mut visited, &mut order);
        }
        order.reverse();

        for id in order {
            walk.touch(&id);
            if start.forced.contains(&id) || self.is_update_necessary(&id) {
                self.run_update(&id);
                walk.updated.push(id);
            } else {
                walk.skipped.push(id);
            }
        }
    }

    fn post_order(&self, id: &str, visited: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
        if self.index_of(id).is_none() || !visited.insert(id.to_string()) {
            return;
        }
        for next in self.downstream_nodes(id) {
            self.post_order(&next, visited, order);
        }
        order.push(id.to_string());
    }

    /// Nodes connected to an updated output port of `id`, in edge order
    fn updated_downstream(&self, id: &str) -> Vec<NodeId> {
        let Some(state) = self.node_state(id) else {
            return Vec::new();
        };
        let mut result: Vec<NodeId> = Vec::new();
        for port in state.outputs.iter().filter(|p| p.is_package_updated()) {
            for edge_id in port.edges() {
                if let Some(edge) = self.edge(edge_id) {
                    if !result.contains(&edge.target.node) {
                        result.push(edge.target.node.clone());
                    }
                }
            }
        }
        result
    }

    fn is_update_necessary(&self, id: &str) -> bool {
        let (Some(index), Some(behavior)) = (self.index_of(id), self.behaviors.get(id)) else {
            return false;
        };
        let ctx = NodeContext::new(&self.nodes[index], &self.nodes, &self.edges);
        behavior.is_update_necessary(&ctx)
    }

    /// Run one node's update and apply what it staged
    pub(crate) fn run_update(&mut self, id: &str) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        let Some(behavior) = self.behaviors.get_mut(id) else {
            return;
        };
        let (result, effects) = {
            let mut ctx = NodeContext::new(&self.nodes[index], &self.nodes, &self.edges);
            let result = behavior.update(&mut ctx);
            (result, ctx.into_effects())
        };

        let state = &mut self.nodes[index];
        match result {
            Ok(()) => {
                for (port, package) in effects.outputs {
                    match state.port_mut(&port, PortSide::Output) {
                        Some(output) => match package {
                            Some(package) => output.update_package(package),
                            None => output.clear_package(),
                        },
                        None => log::error!("node {} has no output port '{}'", id, port),
                    }
                }
                if let Some(cover_text) = effects.cover_text {
                    state.cover_text = cover_text;
                }
                state.error = None;
                log::debug!("updated {} ({})", id, state.node_type());
                emit(self.sink.as_ref(), EngineEvent::node_updated(id, state.node_type()));
            }
            Err(e) => {
                match &e {
                    FlowError::UserScript { .. } => log::warn!("node {} failed: {}", id, e),
                    _ => log::error!("node {} failed: {}", id, e),
                }
                for output in &mut state.outputs {
                    output.clear_package();
                }
                let message = match &e {
                    FlowError::UserScript { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                state.error = Some(message);
                emit(
                    self.sink.as_ref(),
                    EngineEvent::NodeFailed {
                        node_id: id.to_string(),
                        error: e.to_string(),
                    },
                );
            }
        }
    }

    fn finish_walk(&mut self, start: &Propagation, walk: Walk) {
        for id in &walk.touched {
            let Some(index) = self.index_of(id) else {
                continue;
            };
            let mut changed: Vec<(String, PortSide)> = Vec::new();
            let state = &mut self.nodes[index];
            for port in state.inputs.iter_mut().chain(state.outputs.iter_mut()) {
                port.clear_package_update();
                if port.clear_connection_update() {
                    changed.push((port.id.clone(), port.side));
                }
            }
            if let Some(behavior) = self.behaviors.get_mut(id) {
                for (port, side) in changed {
                    behavior.on_connection_change(&port, side);
                }
            }
        }

        let origin: Vec<NodeId> = start.forced.iter().chain(start.checked.iter()).cloned().collect();
        log::debug!(
            "propagation from {:?}: {} updated, {} skipped",
            origin,
            walk.updated.len(),
            walk.skipped.len()
        );
        emit(
            self.sink.as_ref(),
            EngineEvent::PropagationCompleted {
                origin,
                updated: walk.updated,
                skipped: walk.skipped,
            },
        );
    }
}
