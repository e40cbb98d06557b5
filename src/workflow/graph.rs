//! Workflow graph: nodes plus directed edges, resolved to an execution order.
//!
//! Add nodes with `add_node`, connect them with `add_edge`, then `compile` to
//! get a `CompiledWorkflow`. Unlike a strict linear chain, branches and joins
//! are allowed: compile resolves a depth-first order from the start node and
//! appends any unreached nodes in insertion order, so every node runs exactly
//! once per pass.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::WorkflowBuildError;
use crate::node::WorkflowNode;

use super::compiled::CompiledWorkflow;

/// Mutable workflow under construction.
///
/// **Interaction**: Accepts `Arc<dyn WorkflowNode>` (usually from
/// `WorkflowNodeFactory::create_node`); produces `CompiledWorkflow`.
#[derive(Default)]
pub struct WorkflowGraph {
    /// Nodes in insertion order. Duplicate ids are caught at compile time.
    nodes: Vec<Arc<dyn WorkflowNode>>,
    edges: Vec<(String, String)>,
}

impl WorkflowGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. Ids must be unique; duplicates fail at `compile`.
    ///
    /// Returns `&mut Self` for method chaining.
    pub fn add_node(&mut self, node: Arc<dyn WorkflowNode>) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Adds a directed edge between two node ids.
    ///
    /// Both ids must belong to nodes added before `compile()`.
    pub fn add_edge(&mut self, from_id: impl Into<String>, to_id: impl Into<String>) -> &mut Self {
        self.edges.push((from_id.into(), to_id.into()));
        self
    }

    /// Validates the graph and resolves the execution order.
    ///
    /// Validation: at least one node, no duplicate ids, every edge endpoint
    /// registered. The start node is the one with type `"start"` if present,
    /// otherwise the first node without incoming edges, otherwise the first
    /// added. Order is a depth-first walk of out-edges from the start (visited
    /// nodes are not revisited, so cycles terminate), with unreached nodes
    /// appended in insertion order.
    pub fn compile(self) -> Result<CompiledWorkflow, WorkflowBuildError> {
        if self.nodes.is_empty() {
            return Err(WorkflowBuildError::NoExecutableNodes);
        }

        let mut by_id: HashMap<String, Arc<dyn WorkflowNode>> = HashMap::new();
        for node in &self.nodes {
            if by_id
                .insert(node.node_id().to_string(), Arc::clone(node))
                .is_some()
            {
                return Err(WorkflowBuildError::DuplicateNodeId(
                    node.node_id().to_string(),
                ));
            }
        }
        for (from, to) in &self.edges {
            if !by_id.contains_key(from) {
                return Err(WorkflowBuildError::NodeNotFound(from.clone()));
            }
            if !by_id.contains_key(to) {
                return Err(WorkflowBuildError::NodeNotFound(to.clone()));
            }
        }

        let start_id = self.resolve_start();

        // Adjacency in edge insertion order.
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, to) in &self.edges {
            adjacency.entry(from.as_str()).or_default().push(to.as_str());
        }

        // Iterative DFS; successors pushed in reverse so the first-added edge
        // is walked first.
        let mut order: Vec<String> = Vec::with_capacity(self.nodes.len());
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![start_id.as_str()];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            order.push(id.to_string());
            if let Some(successors) = adjacency.get(id) {
                for succ in successors.iter().rev() {
                    if !visited.contains(succ) {
                        stack.push(succ);
                    }
                }
            }
        }
        for node in &self.nodes {
            if !visited.contains(node.node_id()) {
                order.push(node.node_id().to_string());
            }
        }

        Ok(CompiledWorkflow::new(by_id, order))
    }

    fn resolve_start(&self) -> String {
        if let Some(start) = self.nodes.iter().find(|n| n.node_type() == "start") {
            return start.node_id().to_string();
        }
        let targets: HashSet<&str> = self.edges.iter().map(|(_, to)| to.as_str()).collect();
        if let Some(root) = self
            .nodes
            .iter()
            .find(|n| !targets.contains(n.node_id()))
        {
            return root.node_id().to_string();
        }
        self.nodes[0].node_id().to_string()
    }
}
