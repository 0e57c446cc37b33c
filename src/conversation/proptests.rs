//! Property-based tests for the conversation reducer
//!
//! These tests verify key invariants hold across arbitrary frame sequences.

use super::*;
use crate::frame::Frame;
use crate::model::{
    ChatStatus, FunctionCall, FunctionExecutionResult, Message, MessageContent, RequestUsage, Run,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_source() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("agent".to_string()),
        Just("critic".to_string()),
        Just("system".to_string()),
    ]
}

fn arb_usage() -> impl Strategy<Value = Option<(u64, u64)>> {
    proptest::option::of((0u64..10_000, 0u64..10_000))
}

fn usage_json(usage: Option<(u64, u64)>) -> Value {
    match usage {
        Some((p, c)) => json!({"prompt_tokens": p, "completion_tokens": c}),
        None => Value::Null,
    }
}

fn text_frame(source: &str, content: &str, usage: Option<(u64, u64)>) -> Frame {
    let mut value = json!({"source": source, "content": content});
    if usage.is_some() {
        value["models_usage"] = usage_json(usage);
    }
    Frame::Envelope(value)
}

fn request_frame(source: &str, ids: &[String]) -> Frame {
    let calls: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "name": "tool", "arguments": "{}"}))
        .collect();
    Frame::Envelope(json!({"source": source, "content": calls}))
}

fn result_frame(source: &str, ids: &[String]) -> Frame {
    let results: Vec<Value> = ids
        .iter()
        .map(|id| json!({"call_id": id, "content": format!("out-{id}")}))
        .collect();
    Frame::Envelope(json!({"source": source, "content": results}))
}

fn arb_call_ids() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::hash_set("[a-e]{2}", 1..6).prop_map(|set| set.into_iter().collect())
}

fn arb_frame() -> impl Strategy<Value = Frame> {
    prop_oneof![
        (arb_source(), "[a-z ]{0,8}").prop_map(|(s, t)| Frame::delta(s, t)),
        (arb_source(), "[a-z ]{0,8}", arb_usage()).prop_map(|(s, t, u)| text_frame(&s, &t, u)),
        (arb_source(), arb_call_ids()).prop_map(|(s, ids)| request_frame(&s, &ids)),
        (arb_source(), arb_call_ids()).prop_map(|(s, ids)| result_frame(&s, &ids)),
        "[a-z ]{1,10}".prop_map(Frame::TransportError),
        (arb_source(), any::<i64>())
            .prop_map(|(s, n)| Frame::Envelope(json!({"source": s, "content": n}))),
    ]
}

fn arb_status() -> impl Strategy<Value = ChatStatus> {
    prop_oneof![
        Just(ChatStatus::Ready),
        Just(ChatStatus::Thinking),
        Just(ChatStatus::AwaitingInput),
        Just(ChatStatus::Error),
    ]
}

fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        (arb_source(), "[a-z ]{0,8}", arb_usage()).prop_map(|(s, t, u)| {
            let msg = Message::text(s, t);
            match u {
                Some((p, c)) => msg.with_usage(RequestUsage {
                    prompt_tokens: p,
                    completion_tokens: c,
                }),
                None => msg,
            }
        }),
        (arb_source(), arb_call_ids()).prop_map(|(s, ids)| {
            Message::new(
                s,
                MessageContent::ToolCallRequest(
                    ids.iter().map(|id| FunctionCall::new(id, "tool", "{}")).collect(),
                ),
            )
        }),
        (arb_source(), arb_call_ids()).prop_map(|(s, ids)| {
            Message::new(
                s,
                MessageContent::ToolCallResult(
                    ids.iter().map(|id| FunctionExecutionResult::new(id, "ok")).collect(),
                ),
            )
        }),
        "[a-z ]{1,8}".prop_map(|e| Message::new("agent", MessageContent::Error(e))),
    ]
}

fn arb_run() -> impl Strategy<Value = Run> {
    (proptest::collection::vec(arb_message(), 0..12), arb_status()).prop_map(|(messages, status)| {
        let mut run = Run::new("session", "task");
        run.id = "run-under-test".to_string();
        run.messages = messages;
        run.status = status;
        run
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Deltas followed by one finalize yield their concatenation
    #[test]
    fn prop_deltas_concatenate(
        deltas in proptest::collection::vec("[a-zA-Z ]{0,6}", 1..10),
        final_content in "[a-z]{0,6}",
    ) {
        let mut state = ConversationState::default();
        for delta in &deltas {
            state.ingest(&Frame::delta("agent", delta.as_str()));
        }
        state.ingest(&text_frame("agent", &final_content, None));

        prop_assert_eq!(state.messages().len(), 1);
        prop_assert_eq!(
            &state.messages()[0].content,
            &MessageContent::Text(deltas.concat())
        );
        prop_assert!(state.pending_text("agent").is_none());
        prop_assert_eq!(state.status(), ChatStatus::Ready);
    }

    /// A request seeds exactly its calls, unresolved, in request order
    #[test]
    fn prop_request_seeds_records(ids in arb_call_ids()) {
        let mut state = ConversationState::default();
        state.ingest(&request_frame("agent", &ids));

        let records = state.records_for("agent", 0);
        let seeded: Vec<&str> = records.iter().map(|r| r.call.id.as_str()).collect();
        let expected: Vec<&str> = ids.iter().map(String::as_str).collect();
        prop_assert_eq!(seeded, expected);
        prop_assert!(records.iter().all(|r| r.result.is_none()));
    }

    /// Results correlate iff their call id was requested by the same source
    #[test]
    fn prop_results_correlate_only_with_requests(
        requested in arb_call_ids(),
        answered in arb_call_ids(),
    ) {
        let mut state = ConversationState::default();
        state.ingest(&request_frame("agent", &requested));
        state.ingest(&result_frame("agent", &answered));
        // Another source answering the same ids must not interfere
        state.ingest(&result_frame("critic", &requested));

        let answered: HashSet<&String> = answered.iter().collect();
        let records = state.records_for("agent", 0);
        prop_assert_eq!(records.len(), requested.len());
        for record in records {
            let resolved = record.result.as_ref();
            prop_assert_eq!(resolved.is_some(), answered.contains(&record.call.id));
            if let Some(result) = resolved {
                prop_assert_eq!(&result.content, &format!("out-{}", record.call.id));
            }
        }
    }

    /// Token stats are the sums over usage-bearing finalized texts
    #[test]
    fn prop_token_stats_sum(usages in proptest::collection::vec(arb_usage(), 0..20)) {
        let mut state = ConversationState::default();
        for usage in &usages {
            state.ingest(&text_frame("agent", "x", *usage));
        }
        let input: u64 = usages.iter().flatten().map(|(p, _)| p).sum();
        let output: u64 = usages.iter().flatten().map(|(_, c)| c).sum();
        prop_assert_eq!(
            state.token_stats(),
            TokenStats { total: input + output, input, output }
        );
    }

    /// Token stats never decrease while a run is live
    #[test]
    fn prop_token_stats_monotonic(frames in proptest::collection::vec(arb_frame(), 0..40)) {
        let mut state = ConversationState::default();
        let mut previous = state.token_stats();
        for frame in &frames {
            state.ingest(frame);
            let current = state.token_stats();
            prop_assert!(current.total >= previous.total);
            prop_assert!(current.input >= previous.input);
            prop_assert!(current.output >= previous.output);
            previous = current;
        }
    }

    /// Messages are append-only: earlier entries never change
    #[test]
    fn prop_messages_append_only(frames in proptest::collection::vec(arb_frame(), 0..40)) {
        let mut state = ConversationState::default();
        let mut seen: Vec<Message> = Vec::new();
        for frame in &frames {
            state.ingest(frame);
            prop_assert!(state.messages().len() >= seen.len());
            prop_assert_eq!(&state.messages()[..seen.len()], seen.as_slice());
            seen = state.messages().to_vec();
        }
    }

    /// Once in error, only reset/initialize leaves it
    #[test]
    fn prop_error_is_absorbing(frames in proptest::collection::vec(arb_frame(), 0..30)) {
        let mut state = ConversationState::default();
        state.ingest(&Frame::TransportError("down".to_string()));
        for frame in &frames {
            state.ingest(frame);
            prop_assert_eq!(state.status(), ChatStatus::Error);
        }
    }

    /// reset + initialize depends only on the run
    #[test]
    fn prop_initialize_independent_of_history(
        history in proptest::collection::vec(arb_frame(), 0..30),
        run in arb_run(),
    ) {
        let mut dirty = ConversationState::default();
        for frame in &history {
            dirty.ingest(frame);
        }
        dirty.reset();
        dirty.initialize(&run);

        let mut fresh = ConversationState::default();
        fresh.initialize(&run);

        prop_assert_eq!(dirty.messages(), fresh.messages());
        prop_assert_eq!(dirty.messages(), run.messages.as_slice());
        prop_assert_eq!(dirty.status(), run.status);
        prop_assert_eq!(dirty.token_stats(), fresh.token_stats());
        prop_assert!(dirty.streaming().is_empty());
        for (seq, message) in run.messages.iter().enumerate() {
            prop_assert_eq!(
                dirty.records_for(&message.source, seq),
                fresh.records_for(&message.source, seq)
            );
        }
    }

    /// Classification never panics and is deterministic
    #[test]
    fn prop_classify_total_and_pure(frame in arb_frame()) {
        prop_assert_eq!(classify(&frame, "assistant"), classify(&frame, "assistant"));
    }

    /// Any text chunk decodes into a frame that classifies
    #[test]
    fn prop_text_chunks_never_panic(chunk in ".{0,40}") {
        let frame = Frame::from_text(&chunk);
        let _ = classify(&frame, "assistant");
    }
}
