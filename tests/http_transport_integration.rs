//! HTTP transport integration tests
//!
//! Runs the reqwest-backed transport against a `wiremock` mock server.
//! SSE bodies use `set_body_raw(bytes, "text/event-stream")` so the
//! `Content-Type` is exactly what the agent service sends.

mod common;

use chatstream::config::{ChatConfig, ServerConfig};
use chatstream::error::ChatStreamError;
use chatstream::session::{MemorySessionStore, SessionStore};
use chatstream::transport::{ChatRequest, ChatTransport, HttpTransport};
use chatstream::turn::{Turn, TurnState};
use common::{reference_events, sse_body};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_transport(base_url: &str) -> HttpTransport {
    let config = ServerConfig {
        base_url: format!("{}/", base_url),
        ..Default::default()
    };
    HttpTransport::new(&config).expect("http transport")
}

#[tokio::test]
async fn test_streamed_turn_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(serde_json::json!({
            "message": "What now?",
            "enable_deep_think": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&reference_events()).into_bytes(), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri());
    let store = MemorySessionStore::new();
    let request = ChatRequest::new("What now?").with_deep_think(true);

    let outcome = Turn::new(request, &ChatConfig::default())
        .run(&transport, &store)
        .await
        .unwrap();

    assert_eq!(outcome.state, TurnState::Completed);
    assert_eq!(outcome.message.unwrap().timeline.len(), 2);
    assert!(store.get_session("s1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_error_status_surfaces_detail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(serde_json::json!({"detail": "message must not be empty"})),
        )
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri());
    let err = match transport.open_stream(&ChatRequest::new("")).await {
        Ok(_) => panic!("expected the request to be refused"),
        Err(e) => e,
    };

    match err.downcast_ref::<ChatStreamError>() {
        Some(ChatStreamError::Transport { status, message }) => {
            assert_eq!(*status, Some(422));
            assert_eq!(message, "message must not be empty");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_refused_turn_fails_without_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri());
    let store = MemorySessionStore::new();

    let outcome = Turn::new(ChatRequest::new("hi"), &ChatConfig::default())
        .run(&transport, &store)
        .await
        .unwrap();

    assert_eq!(outcome.state, TurnState::Failed);
    assert!(outcome.message.is_none());
    assert!(outcome.error.unwrap().contains("upstream exploded"));
    assert!(store.list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_remote_sessions() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/sessions"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "session_id": "abc",
                "title": "Trip planning",
                "created_at": "2026-01-02T10:00:00Z",
                "updated_at": "2026-01-02T11:00:00Z",
                "message_count": 4
            },
            {"session_id": "def", "title": "Budget"}
        ])))
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri());
    let sessions = transport.list_sessions(10, 5).await.unwrap();

    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session_id, "abc");
    assert_eq!(sessions[0].message_count, 4);
    assert_eq!(sessions[1].title, "Budget");
    assert!(sessions[1].updated_at.is_none());
}
