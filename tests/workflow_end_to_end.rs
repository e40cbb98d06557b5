//! Integration tests: full pipeline and graph runs with mock collaborators.
//!
//! Covers the headline behaviors end to end: long-history compaction with a
//! summary, recursion-stopped tool loops, loop-node iteration across passes,
//! and factory-built workflows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use convograph::{
    EngineError, ExecutionContext, FinishReason, FnTool, LlmResponse, MemoryConfig, Message,
    MockLlm, PipelineRunner, RecursionStrategy, ToolCall, ToolExecutorConfig, WorkflowGraph,
    WorkflowNodeFactory, META_TOOL_STOP,
};

/// Installs the log subscriber once; `RUST_LOG` overrides the default level.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn alternating_conversation(turns: usize) -> Vec<Message> {
    (0..turns)
        .map(|i| {
            if i % 2 == 0 {
                Message::human(format!("question {i}"))
            } else {
                Message::assistant(format!("answer {i}"))
            }
        })
        .collect()
}

/// **Scenario**: a 15-turn history with a 10-turn window is compacted to the
/// last 10 turns verbatim plus a non-empty summary of the overflow.
#[tokio::test]
async fn long_history_compacts_to_window_plus_summary() {
    init_tracing();
    let llm = Arc::new(MockLlm::scripted(vec![
        LlmResponse::text("Earlier turns covered questions zero through four."),
        LlmResponse::text("here is the answer"),
    ]));
    let runner = PipelineRunner::new(llm.clone()).with_memory_config(MemoryConfig {
        base_window_size: 10,
        adaptive_mode: false,
        prioritize_recent: false,
        ..MemoryConfig::default()
    });

    let ctx = runner
        .run(ExecutionContext::new(
            alternating_conversation(15),
            "u1",
            "c1",
        ))
        .await
        .unwrap();

    // Last 10 turns (indices 5..15) kept verbatim, then the model's answer.
    assert_eq!(ctx.messages.len(), 11);
    assert_eq!(ctx.messages[0].content(), "answer 5");
    assert_eq!(ctx.messages[9].content(), "question 14");
    assert_eq!(ctx.messages[10].content(), "here is the answer");
    let summary = ctx.conversation_summary.as_deref().unwrap();
    assert!(summary.contains("zero through four"), "{summary}");
    // One call to summarize, one to answer.
    assert_eq!(llm.invocations(), 2);
}

/// **Scenario**: with strict recursion detection, a repeated identical tool
/// call is stopped before it executes a second time and the run finalizes
/// with a synthesized answer instead of a third model turn.
#[tokio::test]
async fn repeated_tool_call_is_stopped_before_re_execution() {
    init_tracing();
    let same_call = ToolCall::new("c1", "search", json!({"query": "rust"}));
    let llm = Arc::new(MockLlm::scripted(vec![
        LlmResponse::with_tool_calls("", vec![same_call.clone()]),
        LlmResponse::with_tool_calls("", vec![ToolCall::new("c2", "search", json!({"query": "rust"}))]),
    ]));

    let executions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&executions);
    let search = Arc::new(FnTool::from_sync("search", move |_args: Value| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("result".to_string())
    }));

    let runner = PipelineRunner::new(llm.clone())
        .with_tools(vec![search])
        .with_executor_config(ToolExecutorConfig {
            recursion_strategy: RecursionStrategy::Strict,
            ..ToolExecutorConfig::default()
        });

    let ctx = runner
        .run(ExecutionContext::new(
            vec![Message::human("search for rust")],
            "u1",
            "c1",
        ))
        .await
        .unwrap();

    assert_eq!(executions.load(Ordering::SeqCst), 1, "duplicate must not run");
    assert_eq!(ctx.tool_call_count, 1);
    assert_eq!(llm.invocations(), 2, "no model turn after the stop");
    assert!(ctx.metadata.contains_key(META_TOOL_STOP));
    let last = ctx.last_message().unwrap();
    assert!(
        last.content().contains("Stopping tool use"),
        "{}",
        last.content()
    );
}

/// **Scenario**: a loop node advances its counter once per pass and flips its
/// continue flag to false once max_iterations is reached: (1, true),
/// (2, true), (3, true), then (3, false).
#[tokio::test]
async fn loop_node_counts_passes_then_stops() {
    init_tracing();
    let factory = WorkflowNodeFactory::new();
    let mut graph = WorkflowGraph::new();
    graph.add_node(factory.create_node("start", "s", &Value::Null).unwrap());
    graph.add_node(
        factory
            .create_node("loop", "l", &json!({"max_iterations": 3}))
            .unwrap(),
    );
    graph.add_node(factory.create_node("end", "e", &Value::Null).unwrap());
    graph.add_edge("s", "l");
    graph.add_edge("l", "e");
    let workflow = graph.compile().unwrap();

    let mut ctx = ExecutionContext::new(vec![], "u1", "c1");
    let mut observed = Vec::new();
    for _ in 0..4 {
        ctx = workflow.invoke(ctx).await.unwrap();
        let count = ctx.loop_state["l"];
        let cont = ctx.metadata["loop_l_continue"].as_bool().unwrap();
        observed.push((count, cont));
    }
    assert_eq!(observed, vec![(1, true), (2, true), (3, true), (3, false)]);
}

/// **Scenario**: a factory-built workflow evaluates conditions against the
/// conversation and manipulates variables.
#[tokio::test]
async fn factory_built_workflow_evaluates_conditions_and_variables() {
    init_tracing();
    let factory = WorkflowNodeFactory::new();
    let mut graph = WorkflowGraph::new();
    graph.add_node(factory.create_node("start", "s", &Value::Null).unwrap());
    graph.add_node(
        factory
            .create_node(
                "variable",
                "greeting",
                &json!({"variable_name": "tone", "operation": "set", "value": "friendly"}),
            )
            .unwrap(),
    );
    graph.add_node(
        factory
            .create_node("conditional", "c", &json!({"condition": "message contains hello"}))
            .unwrap(),
    );
    graph.add_node(factory.create_node("end", "e", &Value::Null).unwrap());
    graph.add_edge("s", "greeting");
    graph.add_edge("greeting", "c");
    graph.add_edge("c", "e");
    let workflow = graph.compile().unwrap();

    let ctx = workflow
        .invoke(ExecutionContext::new(
            vec![Message::human("Hello there!")],
            "u1",
            "c1",
        ))
        .await
        .unwrap();

    assert_eq!(ctx.variables["tone"], json!("friendly"));
    assert_eq!(ctx.conditional_results["c"], true);
    let trace: Vec<_> = ctx
        .execution_history
        .iter()
        .map(|r| r.node_id.as_str())
        .collect();
    assert_eq!(trace, vec!["s", "greeting", "c", "e"]);
}

/// **Scenario**: a tool that errors does not abort the run; the failure is
/// surfaced to the model as a tool result and the next turn answers.
#[tokio::test]
async fn failed_tool_result_is_surfaced_not_fatal() {
    init_tracing();
    let llm = Arc::new(MockLlm::scripted(vec![
        LlmResponse::with_tool_calls("", vec![ToolCall::new("c1", "flaky", json!({}))]),
        LlmResponse::text("could not look that up"),
    ]));
    let flaky = Arc::new(FnTool::from_sync("flaky", |_args: Value| {
        Err(EngineError::ToolFailed {
            tool: "flaky".into(),
            detail: "upstream offline".into(),
        })
    }));
    let runner = PipelineRunner::new(llm.clone()).with_tools(vec![flaky]);

    let ctx = runner
        .run(ExecutionContext::new(
            vec![Message::human("look this up")],
            "u1",
            "c1",
        ))
        .await
        .unwrap();

    let tool_turn = ctx
        .messages
        .iter()
        .find(|m| m.role() == "tool")
        .expect("tool result present");
    assert!(tool_turn.content().starts_with("Error:"), "{}", tool_turn.content());
    assert!(tool_turn.content().contains("upstream offline"));
    assert_eq!(ctx.last_message().unwrap().content(), "could not look that up");
}

/// **Scenario**: a stop finish reason ends the turn even when tool calls are
/// attached and budget remains; the calls are never executed.
#[tokio::test]
async fn stop_finish_reason_overrides_attached_tool_calls() {
    init_tracing();
    let llm = Arc::new(MockLlm::scripted(vec![LlmResponse {
        content: "final".into(),
        tool_calls: vec![ToolCall::new("c1", "search", json!({}))],
        finish_reason: FinishReason::Stop,
    }]));
    let executions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&executions);
    let search = Arc::new(FnTool::from_sync("search", move |_args: Value| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("result".to_string())
    }));
    let runner = PipelineRunner::new(llm.clone()).with_tools(vec![search]);

    let ctx = runner
        .run(ExecutionContext::new(
            vec![Message::human("hi")],
            "u1",
            "c1",
        ))
        .await
        .unwrap();

    assert_eq!(llm.invocations(), 1);
    assert_eq!(executions.load(Ordering::SeqCst), 0);
    assert!(ctx.messages.iter().all(|m| m.role() != "tool"));
    assert_eq!(ctx.tool_call_count, 0);
}
