//! Node factory: type-tag registry with build-time config validation.
//!
//! Maps a node-type string to a constructor, deserializes the per-node
//! config, and refuses misconfigured nodes before anything executes:
//! factory failure happens at graph-build time, never mid-run. Collaborator
//! handles (LLM, retriever, tools) are injected once here, so the nodes stay
//! stateless across runs.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    ConditionalNode, DelayNode, EndNode, ErrorHandlerNode, LoopNode, MemoryNode, RetrievalNode,
    StartNode, ToolsNode, VariableNode, WorkflowNode,
};
use crate::error::WorkflowBuildError;
use crate::llm::LlmClient;
use crate::retrieval::Retriever;
use crate::tools::Tool;

/// Collaborator handles available to node constructors.
#[derive(Clone, Default)]
pub struct NodeResources {
    pub llm: Option<Arc<dyn LlmClient>>,
    pub retriever: Option<Arc<dyn Retriever>>,
    pub tools: Vec<Arc<dyn Tool>>,
}

type Constructor = Box<
    dyn Fn(&str, &Value, &NodeResources) -> Result<Arc<dyn WorkflowNode>, WorkflowBuildError>
        + Send
        + Sync,
>;

/// Registry mapping node-type tags to constructors.
///
/// **Interaction**: Used by callers assembling a `WorkflowGraph` from a
/// declarative definition. `register` extends the registry with custom node
/// types; the ten built-ins are seeded by `new`.
pub struct WorkflowNodeFactory {
    registry: HashMap<String, Constructor>,
    resources: NodeResources,
}

impl Default for WorkflowNodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowNodeFactory {
    /// A factory with the ten built-in node types and no collaborators.
    pub fn new() -> Self {
        let mut factory = Self {
            registry: HashMap::new(),
            resources: NodeResources::default(),
        };
        factory.register_builtins();
        factory
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.resources.llm = Some(llm);
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.resources.retriever = Some(retriever);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.resources.tools = tools;
        self
    }

    /// Registers (or replaces) a constructor for a node-type tag.
    pub fn register<F>(&mut self, node_type: impl Into<String>, constructor: F)
    where
        F: Fn(&str, &Value, &NodeResources) -> Result<Arc<dyn WorkflowNode>, WorkflowBuildError>
            + Send
            + Sync
            + 'static,
    {
        self.registry.insert(node_type.into(), Box::new(constructor));
    }

    /// Registered type tags, for diagnostics.
    pub fn known_types(&self) -> Vec<&str> {
        self.registry.keys().map(String::as_str).collect()
    }

    /// Builds and validates one node. Unknown tags and invalid configs fail
    /// here, so execution never sees a misconfigured node.
    pub fn create_node(
        &self,
        node_type: &str,
        node_id: &str,
        config: &Value,
    ) -> Result<Arc<dyn WorkflowNode>, WorkflowBuildError> {
        let constructor = self
            .registry
            .get(node_type)
            .ok_or_else(|| WorkflowBuildError::UnknownNodeType(node_type.to_string()))?;
        let node = constructor(node_id, config, &self.resources)?;
        let errors = node.validate_config();
        if errors.is_empty() {
            Ok(node)
        } else {
            Err(WorkflowBuildError::InvalidConfig {
                node_id: node_id.to_string(),
                errors,
            })
        }
    }

    fn register_builtins(&mut self) {
        self.register("start", |id, _, _| {
            Ok(Arc::new(StartNode::new(id)) as Arc<dyn WorkflowNode>)
        });
        self.register("end", |id, _, _| {
            Ok(Arc::new(EndNode::new(id)) as Arc<dyn WorkflowNode>)
        });
        self.register("memory", |id, config, res| {
            let mut node = MemoryNode::new(id, parse_config(id, config)?);
            if let Some(llm) = &res.llm {
                node = node.with_llm(Arc::clone(llm));
            }
            Ok(Arc::new(node) as Arc<dyn WorkflowNode>)
        });
        self.register("retrieval", |id, config, res| {
            let mut node = RetrievalNode::new(id, parse_config(id, config)?);
            if let Some(retriever) = &res.retriever {
                node = node.with_retriever(Arc::clone(retriever));
            }
            Ok(Arc::new(node) as Arc<dyn WorkflowNode>)
        });
        self.register("conditional", |id, config, _| {
            Ok(Arc::new(ConditionalNode::new(id, parse_config(id, config)?))
                as Arc<dyn WorkflowNode>)
        });
        self.register("loop", |id, config, _| {
            Ok(Arc::new(LoopNode::new(id, parse_config(id, config)?)) as Arc<dyn WorkflowNode>)
        });
        self.register("variable", |id, config, _| {
            Ok(Arc::new(VariableNode::new(id, parse_config(id, config)?))
                as Arc<dyn WorkflowNode>)
        });
        self.register("error_handler", |id, config, _| {
            Ok(
                Arc::new(ErrorHandlerNode::new(id, parse_config(id, config)?))
                    as Arc<dyn WorkflowNode>,
            )
        });
        self.register("tools", |id, config, res| {
            let node =
                ToolsNode::new(id, parse_config(id, config)?).with_tools(res.tools.clone());
            Ok(Arc::new(node) as Arc<dyn WorkflowNode>)
        });
        self.register("delay", |id, config, _| {
            Ok(Arc::new(DelayNode::new(id, parse_config(id, config)?)) as Arc<dyn WorkflowNode>)
        });
    }
}

/// Deserializes a node config, treating `null` as all-defaults.
fn parse_config<T>(node_id: &str, config: &Value) -> Result<T, WorkflowBuildError>
where
    T: DeserializeOwned + Default,
{
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone()).map_err(|e| WorkflowBuildError::MalformedConfig {
        node_id: node_id.to_string(),
        detail: e.to_string(),
    })
}
