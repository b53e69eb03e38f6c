//! Integration tests for the streaming turn driver against a mock backend.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use nebula_client::{ClientError, Config, ConversationState, NebulaClient, TurnUpdate};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.base_url = server.uri();
    config.config_state_id = "cfg-1".to_string();
    config
}

/// SSE body announcing ids, one status notice, and the given chunks.
fn sse_body(conversation_id: &str, segment_id: &str, status: &str, chunks: &[&str]) -> String {
    let ids = json!({
        "ConversationId": conversation_id,
        "ConversationSegmentId": segment_id,
    });
    let mut body = format!(
        "event: conversation-and-segment-id\ndata: {}\n\n",
        STANDARD.encode(ids.to_string())
    );
    body.push_str(&format!(
        "event: step-update\ndata: {}\n\n",
        STANDARD.encode(status)
    ));
    body.push_str("event: response-updated\n");
    for chunk in chunks {
        body.push_str(&format!("data: {}\n\n", STANDARD.encode(chunk)));
    }
    body
}

fn event_stream_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream")
}

#[tokio::test]
async fn first_turn_creates_a_conversation_and_commits_ids() {
    let server = MockServer::start().await;
    let mut state = ConversationState::new();
    let session_identifier = state.session_identifier().to_string();

    Mock::given(method("POST"))
        .and(path("/api/internal/configStates/cfg-1/conversations"))
        .and(header("authorization", "Bearer tok"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(json!({
            "question": "hello",
            "session": { "sessionIdentifier": session_identifier },
        })))
        .respond_with(event_stream_response(sse_body(
            "conv-1",
            "seg-1",
            "Thinking",
            &["Hel", "lo"],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = NebulaClient::new(&test_config(&server)).unwrap();
    let result = client.send_turn("tok", &mut state, "hello").await.unwrap();

    assert_eq!(result.response, "Hello");
    assert_eq!(result.status_updates, vec!["Thinking".to_string()]);
    assert_eq!(result.conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(result.segment_id.as_deref(), Some("seg-1"));
    assert!(state.is_established());
    assert_eq!(state.conversation_id(), Some("conv-1"));
    assert_eq!(state.last_segment_id(), Some("seg-1"));
}

#[tokio::test]
async fn second_turn_appends_with_the_previous_segment_as_parent() {
    let server = MockServer::start().await;
    let mut state = ConversationState::new();

    Mock::given(method("POST"))
        .and(path("/api/internal/configStates/cfg-1/conversations"))
        .respond_with(event_stream_response(sse_body(
            "conv-1", "seg-1", "Thinking", &["first"],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(
            "/api/internal/configStates/cfg-1/conversations/conv-1/segments",
        ))
        .and(body_partial_json(json!({
            "question": "more",
            "parentId": "seg-1",
        })))
        .respond_with(event_stream_response(sse_body(
            "conv-1", "seg-2", "Thinking", &["second"],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = NebulaClient::new(&test_config(&server)).unwrap();
    let first = client.send_turn("tok", &mut state, "hello").await.unwrap();
    let second = client.send_turn("tok", &mut state, "more").await.unwrap();

    // Parent chain is monotonic: the second turn's parent was the first
    // turn's segment, and the committed pointer moved on.
    assert_eq!(first.segment_id.as_deref(), Some("seg-1"));
    assert_eq!(second.segment_id.as_deref(), Some("seg-2"));
    assert_ne!(first.segment_id, second.segment_id);
    assert_eq!(state.last_segment_id(), Some("seg-2"));
}

#[tokio::test]
async fn rejected_request_leaves_state_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired token"))
        .mount(&server)
        .await;

    let client = NebulaClient::new(&test_config(&server)).unwrap();
    let mut state = ConversationState::new();
    let before = state.clone();

    let err = client
        .send_turn("stale", &mut state, "hello")
        .await
        .unwrap_err();

    match err {
        ClientError::Status { status, body } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(body, "expired token");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
    assert_eq!(state, before);
}

#[tokio::test]
async fn non_event_stream_response_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let client = NebulaClient::new(&test_config(&server)).unwrap();
    let mut state = ConversationState::new();
    let before = state.clone();

    let err = client
        .send_turn("tok", &mut state, "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Protocol(_)));
    assert_eq!(state, before);
}

#[tokio::test]
async fn connect_failure_surfaces_as_transport_error() {
    // Nothing is listening on this port.
    let mut config = Config::default();
    config.base_url = "http://127.0.0.1:9".to_string();
    config.config_state_id = "cfg-1".to_string();

    let client = NebulaClient::new(&config).unwrap();
    let mut state = ConversationState::new();
    let before = state.clone();

    let err = client
        .send_turn("tok", &mut state, "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(state, before);
}

#[tokio::test]
async fn streaming_turn_delivers_updates_in_arrival_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(event_stream_response(sse_body(
            "conv-1",
            "seg-1",
            "Thinking",
            &["one ", "two"],
        )))
        .mount(&server)
        .await;

    let client = NebulaClient::new(&test_config(&server)).unwrap();
    let mut state = ConversationState::new();
    let (tx, mut rx) = mpsc::channel(8);

    let result = client
        .send_turn_streaming("tok", &mut state, "hello", tx)
        .await
        .unwrap();

    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }
    assert_eq!(
        updates,
        vec![
            TurnUpdate::Status("Thinking".to_string()),
            TurnUpdate::Chunk("one ".to_string()),
            TurnUpdate::Chunk("two".to_string()),
        ]
    );
    assert_eq!(result.response, "one two");
}

#[tokio::test]
async fn unknown_events_and_undecodable_payloads_do_not_derail_a_turn() {
    let server = MockServer::start().await;
    let body = format!(
        "event: heartbeat\ndata: {}\n\n\
         event: response-updated\ndata: !!not-base64!!\n\n\
         data: {}\n\n",
        STANDARD.encode("ignored"),
        STANDARD.encode(" and more"),
    );
    Mock::given(method("POST"))
        .respond_with(event_stream_response(body))
        .mount(&server)
        .await;

    let client = NebulaClient::new(&test_config(&server)).unwrap();
    let mut state = ConversationState::new();
    let result = client.send_turn("tok", &mut state, "hello").await.unwrap();

    // The undecodable payload passes through raw; the unknown event is
    // skipped; the trailing data line still belongs to response-updated.
    assert_eq!(result.response, "!!not-base64!! and more");
    assert!(result.status_updates.is_empty());
    // No ids arrived, so the conversation is still fresh.
    assert!(!state.is_established());
}
