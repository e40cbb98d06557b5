//! Condition DSL shared by Conditional and Loop nodes.
//!
//! Three recognized clause shapes, anything else defaults to true:
//! - `message contains "<term>"` — case-insensitive substring test against
//!   the last message.
//! - `variable <name> equals <value>` — string equality against `variables`.
//! - `tool_calls > N` / `tool_calls < N` — integer comparison.
//!
//! Malformed clauses that start like a recognized shape return `Err` so the
//! caller can record the failure in `error_state`.

use serde_json::Value;

use crate::context::ExecutionContext;

/// Evaluates one condition string against the context.
pub fn evaluate(condition: &str, ctx: &ExecutionContext) -> Result<bool, String> {
    let condition = condition.trim();

    if let Some(rest) = condition.strip_prefix("message contains ") {
        let term = unquote(rest).to_lowercase();
        if term.is_empty() {
            return Err("message contains: empty term".to_string());
        }
        return Ok(ctx
            .last_message()
            .map(|m| m.content().to_lowercase().contains(&term))
            .unwrap_or(false));
    }

    if let Some(rest) = condition.strip_prefix("variable ") {
        let (name, expected) = rest
            .split_once(" equals ")
            .ok_or_else(|| format!("variable clause missing 'equals': {condition}"))?;
        let name = name.trim();
        let expected = unquote(expected);
        return Ok(ctx
            .variables
            .get(name)
            .map(|v| value_as_string(v) == expected)
            .unwrap_or(false));
    }

    if let Some(rest) = condition.strip_prefix("tool_calls ") {
        let mut parts = rest.split_whitespace();
        let op = parts
            .next()
            .ok_or_else(|| format!("tool_calls clause missing operator: {condition}"))?;
        let n: i64 = parts
            .next()
            .ok_or_else(|| format!("tool_calls clause missing operand: {condition}"))?
            .parse()
            .map_err(|_| format!("tool_calls operand is not an integer: {condition}"))?;
        let count = ctx.tool_call_count as i64;
        return match op {
            ">" => Ok(count > n),
            "<" => Ok(count < n),
            other => Err(format!("tool_calls operator must be > or <, got '{other}'")),
        };
    }

    // Unrecognized conditions default to true.
    Ok(true)
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

fn value_as_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
