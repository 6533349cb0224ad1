//! HTTP client tests against a mock Jarvis backend.

use jarvis::api::{ChatBackend, FnNotifier, JarvisClient, NoticeLevel, StreamEvent, TracingNotifier};
use jarvis::error::ApiError;
use jarvis::types::{ChatRequest, MessageId};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(session_id: Option<&str>) -> ChatRequest {
    ChatRequest {
        message: "What's on my calendar?".into(),
        session_id: session_id.map(str::to_string),
        user_id: "user-1".into(),
    }
}

async fn collect(client: &JarvisClient, request: ChatRequest) -> (Result<(), ApiError>, Vec<StreamEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = client.stream_chat(request, tx).await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (result, events)
}

#[tokio::test]
async fn test_stream_chat_decodes_events() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"type\":\"session\",\"session_id\":\"s-42\"}\n\n",
        "data: {\"type\":\"content\",\"content\":\"You have \"}\n\n",
        "data: {\"type\":\"typing\"}\n\n",
        "data: not json\n\n",
        "data: {\"type\":\"content\",\"content\":\"two meetings.\"}\n\n",
        "data: {\"type\":\"complete\",\"intent\":\"calendar\",\"agent_used\":\"scheduler\"}\n\n",
        "data: {\"type\":\"content\",\"content\":\"ignored\"}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(header("accept", "text/event-stream"))
        .and(body_json(serde_json::json!({
            "message": "What's on my calendar?",
            "user_id": "user-1"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = JarvisClient::new(server.uri(), Arc::new(TracingNotifier));
    let (result, events) = collect(&client, request(None)).await;

    result.unwrap();
    assert_eq!(
        events,
        vec![
            StreamEvent::Session {
                session_id: "s-42".into()
            },
            StreamEvent::Content {
                text: "You have ".into()
            },
            StreamEvent::Content {
                text: "two meetings.".into()
            },
            StreamEvent::Complete {
                intent: Some("calendar".into()),
                agent_used: Some("scheduler".into())
            },
        ]
    );
}

#[tokio::test]
async fn test_stream_chat_sends_session_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(body_json(serde_json::json!({
            "message": "What's on my calendar?",
            "session_id": "s-1",
            "user_id": "user-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let client = JarvisClient::new(format!("{}/", server.uri()), Arc::new(TracingNotifier));
    let (result, events) = collect(&client, request(Some("s-1"))).await;
    result.unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_terminal());
}

#[tokio::test]
async fn test_error_status_notifies_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let notices: Arc<Mutex<Vec<(NoticeLevel, String)>>> = Arc::default();
    let sink = notices.clone();
    let client = JarvisClient::new(server.uri(), Arc::new(TracingNotifier));
    client.set_notifier(Arc::new(FnNotifier(move |level: NoticeLevel, message: &str| {
        sink.lock().unwrap().push((level, message.to_string()));
    })));

    let (result, events) = collect(&client, request(None)).await;
    match result {
        Err(ApiError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(events.is_empty());

    let notices = notices.lock().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].0, NoticeLevel::Error);
}

#[tokio::test]
async fn test_fetch_messages_uses_server_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/s-9/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 1, "role": "user", "content": "hi", "created_at": "2025-03-01T10:00:00Z"},
            {"id": "m-2", "role": "assistant", "content": "hello", "agent_used": "general",
             "created_at": "2025-03-01T10:00:02Z"}
        ])))
        .mount(&server)
        .await;

    let client = JarvisClient::new(server.uri(), Arc::new(TracingNotifier));
    let messages = client.fetch_messages("s-9").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, MessageId::Server("1".into()));
    assert_eq!(messages[1].agent_used.as_deref(), Some("general"));
}

#[tokio::test]
async fn test_list_sessions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions"))
        .and(query_param("user_id", "user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "s-1", "title": "Trip planning"},
            {"id": "s-2"}
        ])))
        .mount(&server)
        .await;

    let client = JarvisClient::new(server.uri(), Arc::new(TracingNotifier));
    let sessions = client.list_sessions("user-1").await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].title.as_deref(), Some("Trip planning"));
    assert_eq!(sessions[1].title, None);
}

#[tokio::test]
async fn test_malformed_history_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/s-1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = JarvisClient::new(server.uri(), Arc::new(TracingNotifier));
    let err = client.fetch_messages("s-1").await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_session_id_is_percent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/a%2Fb%20c/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = JarvisClient::new(server.uri(), Arc::new(TracingNotifier));
    let messages = client.fetch_messages("a/b c").await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jarvis/api/sessions"))
        .and(query_param("user_id", "user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = JarvisClient::new(format!("{}/jarvis/", server.uri()), Arc::new(TracingNotifier));
    assert!(client.list_sessions("user-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_base_url_is_reported() {
    let client = JarvisClient::new("not a url", Arc::new(TracingNotifier));
    let err = client.fetch_messages("s-1").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidUrl(_)));
}
