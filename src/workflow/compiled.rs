//! Compiled workflow: immutable node set plus resolved execution order.
//!
//! Built by `WorkflowGraph::compile`. Runs nodes in order, merging each
//! node's `ContextUpdate` into the run context, and stops early when a node
//! raises the stop flag or an end node completes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::node::WorkflowNode;
use crate::stream::{StreamMode, WorkflowEvent};

/// Immutable, executable workflow.
///
/// **Interaction**: Produced by `WorkflowGraph::compile`; `invoke` runs one
/// pass over the context, `stream` does the same while emitting
/// `WorkflowEvent`s over a channel-backed stream.
#[derive(Clone, Debug)]
pub struct CompiledWorkflow {
    nodes: HashMap<String, Arc<dyn WorkflowNode>>,
    order: Vec<String>,
}

impl CompiledWorkflow {
    pub(super) fn new(nodes: HashMap<String, Arc<dyn WorkflowNode>>, order: Vec<String>) -> Self {
        Self { nodes, order }
    }

    /// Resolved execution order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Shared run loop used by invoke() and stream(): executes nodes in order.
    async fn run_loop(
        &self,
        ctx: &mut ExecutionContext,
        tx: Option<&mpsc::Sender<WorkflowEvent>>,
        modes: &HashSet<StreamMode>,
    ) -> Result<(), EngineError> {
        for node_id in &self.order {
            let node = self
                .nodes
                .get(node_id)
                .ok_or_else(|| EngineError::ExecutionFailed(format!("missing node {node_id}")))?;
            let node_type = node.node_type();

            debug!(node_id = %node_id, node_type, "executing node");
            if let Some(tx) = tx {
                let _ = tx
                    .send(WorkflowEvent::NodeStarted {
                        node_id: node_id.clone(),
                        node_type: node_type.to_string(),
                    })
                    .await;
            }

            let update = match node.execute(ctx).await {
                Ok(update) => update,
                Err(e) => {
                    error!(node_id = %node_id, node_type, error = %e, "node failed");
                    return Err(e);
                }
            };

            if let Some(tx) = tx {
                if modes.contains(&StreamMode::Updates) {
                    let _ = tx
                        .send(WorkflowEvent::Updates {
                            node_id: node_id.clone(),
                            update: update.clone(),
                        })
                        .await;
                }
            }
            ctx.apply(node_id, node_type, update);
            if let Some(tx) = tx {
                if modes.contains(&StreamMode::Values) {
                    let _ = tx.send(WorkflowEvent::Values(Box::new(ctx.clone()))).await;
                }
            }

            if ctx.should_stop() {
                info!(node_id = %node_id, "run stopped early by node request");
                break;
            }
            if node_type == "end" {
                break;
            }
        }
        Ok(())
    }

    /// Runs one pass over the workflow and returns the final context.
    ///
    /// Nodes execute in resolved order; each node's delta is merged before
    /// the next node runs. The pass ends after the last node, after an end
    /// node, or as soon as a node sets the stop flag.
    pub async fn invoke(&self, ctx: ExecutionContext) -> Result<ExecutionContext, EngineError> {
        let mut ctx = ctx;
        self.run_loop(&mut ctx, None, &HashSet::new()).await?;
        Ok(ctx)
    }

    /// Runs the workflow on a spawned task, emitting events as it goes.
    ///
    /// `NodeStarted` is always emitted; `Updates` and `Values` follow the
    /// selected modes. The final event is `Finished` with the merged context
    /// (omitted if a node fails structurally).
    pub fn stream(
        &self,
        ctx: ExecutionContext,
        modes: impl Into<HashSet<StreamMode>>,
    ) -> ReceiverStream<WorkflowEvent> {
        let (tx, rx) = mpsc::channel(128);
        let workflow = self.clone();
        let modes: HashSet<StreamMode> = modes.into();

        tokio::spawn(async move {
            let mut ctx = ctx;
            if workflow.run_loop(&mut ctx, Some(&tx), &modes).await.is_ok() {
                let _ = tx.send(WorkflowEvent::Finished(Box::new(ctx))).await;
            }
        });

        ReceiverStream::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio_stream::StreamExt;

    use crate::context::META_SHOULD_STOP;
    use crate::message::Message;
    use crate::node::WorkflowNodeFactory;
    use crate::workflow::WorkflowGraph;

    fn build_workflow(specs: &[(&str, &str, Value)], edges: &[(&str, &str)]) -> CompiledWorkflow {
        let factory = WorkflowNodeFactory::new();
        let mut graph = WorkflowGraph::new();
        for (node_type, id, config) in specs {
            graph.add_node(factory.create_node(node_type, id, config).unwrap());
        }
        for (from, to) in edges {
            graph.add_edge(*from, *to);
        }
        graph.compile().unwrap()
    }

    /// **Scenario**: a start/variable/end chain runs each node once and
    /// records the trace.
    #[tokio::test]
    async fn invoke_runs_nodes_in_order() {
        let workflow = build_workflow(
            &[
                ("start", "s", Value::Null),
                ("variable", "v", json!({"variable_name": "n", "operation": "increment"})),
                ("end", "e", Value::Null),
            ],
            &[("s", "v"), ("v", "e")],
        );
        let ctx = workflow
            .invoke(ExecutionContext::new(vec![Message::human("hi")], "u", "c"))
            .await
            .unwrap();
        let trace: Vec<_> = ctx
            .execution_history
            .iter()
            .map(|r| r.node_id.as_str())
            .collect();
        assert_eq!(trace, vec!["s", "v", "e"]);
        assert_eq!(ctx.variables["n"], json!(1));
        assert!(ctx.metadata.contains_key("execution_time_ms"));
    }

    /// **Scenario**: an error handler configured to stop halts the pass
    /// before later nodes run.
    #[tokio::test]
    async fn stop_flag_halts_run() {
        let workflow = build_workflow(
            &[
                ("start", "s", Value::Null),
                ("error_handler", "eh", json!({"retry_count": 0, "fallback_action": "stop"})),
                ("variable", "v", json!({"variable_name": "n", "operation": "increment"})),
                ("end", "e", Value::Null),
            ],
            &[("s", "eh"), ("eh", "v"), ("v", "e")],
        );
        let mut ctx = ExecutionContext::new(vec![], "u", "c");
        ctx.error_state.insert("s_error".into(), "boom".into());
        let ctx = workflow.invoke(ctx).await.unwrap();
        assert_eq!(ctx.metadata[META_SHOULD_STOP], json!(true));
        assert!(!ctx.variables.contains_key("n"), "later node must not run");
    }

    /// **Scenario**: an end node placed mid-order terminates the pass there.
    #[tokio::test]
    async fn end_node_terminates_pass() {
        let workflow = build_workflow(
            &[
                ("start", "s", Value::Null),
                ("end", "e", Value::Null),
                ("variable", "v", json!({"variable_name": "n", "operation": "increment"})),
            ],
            &[("s", "e"), ("e", "v")],
        );
        let ctx = workflow
            .invoke(ExecutionContext::new(vec![], "u", "c"))
            .await
            .unwrap();
        assert!(!ctx.variables.contains_key("n"));
    }

    /// **Scenario**: stream emits NodeStarted for every node, Values per
    /// node when selected, and a Finished event with the final context.
    #[tokio::test]
    async fn stream_emits_events_and_finishes() {
        let workflow = build_workflow(
            &[("start", "s", Value::Null), ("end", "e", Value::Null)],
            &[("s", "e")],
        );
        let events: Vec<_> = workflow
            .stream(
                ExecutionContext::new(vec![], "u", "c"),
                HashSet::from_iter([StreamMode::Values]),
            )
            .collect()
            .await;

        let started: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::NodeStarted { node_id, .. } => Some(node_id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["s".to_string(), "e".to_string()]);
        let values = events
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::Values(_)))
            .count();
        assert_eq!(values, 2);
        match events.last() {
            Some(WorkflowEvent::Finished(ctx)) => {
                assert_eq!(ctx.execution_history.len(), 2);
            }
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    /// **Scenario**: Updates mode carries the un-merged delta with its node id.
    #[tokio::test]
    async fn stream_updates_carry_deltas() {
        let workflow = build_workflow(
            &[
                ("start", "s", Value::Null),
                ("variable", "v", json!({"variable_name": "n", "operation": "set", "value": 7})),
                ("end", "e", Value::Null),
            ],
            &[("s", "v"), ("v", "e")],
        );
        let events: Vec<_> = workflow
            .stream(
                ExecutionContext::new(vec![], "u", "c"),
                HashSet::from_iter([StreamMode::Updates]),
            )
            .collect()
            .await;
        let delta = events.iter().find_map(|e| match e {
            WorkflowEvent::Updates { node_id, update } if node_id == "v" => Some(update.clone()),
            _ => None,
        });
        assert_eq!(delta.unwrap().variables["n"], json!(7));
    }
}
