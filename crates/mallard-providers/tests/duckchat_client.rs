//! Integration tests for the duckchat client against a mocked upstream.
//!
//! Covers token acquisition (header present/absent, retry-after-transient),
//! dispatch headers and body shape, token rotation, and end-to-end stream
//! decoding in both dialects.

use std::sync::Arc;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mallard_protocol::ChatTurn;
use mallard_providers::{
    collect_reply, Dialect, DuckChatClient, DuckChatConfig, FixedIdentity, UpstreamError,
};

const TEST_AGENT: &str = "test-agent/1.0";

fn client_for(server: &MockServer, dialect: Dialect) -> DuckChatClient {
    let config = DuckChatConfig {
        token_backoff_step_ms: 5,
        ..DuckChatConfig::default()
    }
    .with_base_url(server.uri())
    .with_dialect(dialect);

    DuckChatClient::with_identity(config, Arc::new(FixedIdentity(TEST_AGENT.into()))).unwrap()
}

#[tokio::test]
async fn test_acquire_token_reads_vqd_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/duckchat/v1/status"))
        .and(header("x-vqd-accept", "1"))
        .and(header("user-agent", TEST_AGENT))
        .respond_with(ResponseTemplate::new(200).insert_header("x-vqd-4", "vqd-123"))
        .mount(&server)
        .await;

    let client = client_for(&server, Dialect::Sse);
    assert_eq!(client.acquire_token().await.unwrap(), "vqd-123");
}

#[tokio::test]
async fn test_acquire_token_missing_header_is_hard_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/duckchat/v1/status"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server, Dialect::Sse);
    let err = client.acquire_token().await.unwrap_err();
    assert!(matches!(err, UpstreamError::TokenUnavailable));
}

#[tokio::test]
async fn test_acquire_token_retries_transient_failures() {
    let server = MockServer::start().await;

    // Two server errors, then a good answer. Mount order decides precedence.
    Mock::given(method("GET"))
        .and(path("/duckchat/v1/status"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/duckchat/v1/status"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-vqd-4", "vqd-after-retry"))
        .mount(&server)
        .await;

    let config = DuckChatConfig {
        token_retries: 3,
        token_backoff_step_ms: 5,
        ..DuckChatConfig::default()
    }
    .with_base_url(server.uri());
    let client =
        DuckChatClient::with_identity(config, Arc::new(FixedIdentity(TEST_AGENT.into()))).unwrap();

    assert_eq!(client.acquire_token().await.unwrap(), "vqd-after-retry");
}

#[tokio::test]
async fn test_acquire_token_no_retry_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/duckchat/v1/status"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Dialect::Sse);
    let err = client.acquire_token().await.unwrap_err();
    assert!(matches!(err, UpstreamError::Http { status: 503 }));
}

#[tokio::test]
async fn test_chat_sends_token_model_and_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/duckchat/v1/chat"))
        .and(header("x-vqd-4", "vqd-123"))
        .and(header("user-agent", TEST_AGENT))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "hello"}],
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("data: {\"message\":\"Hel\"}\n\ndata: {\"message\":\"lo\"}\n\ndata: [DONE]\n"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Dialect::Sse);
    let turns = vec![ChatTurn::user("hello")];
    let exchange = client.chat("vqd-123", &turns, "gpt-4o-mini").await.unwrap();

    assert!(exchange.refreshed_token.is_none());
    let reply = collect_reply(exchange.frames).await.unwrap();
    assert_eq!(reply, "Hello");
}

#[tokio::test]
async fn test_chat_captures_rotated_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/duckchat/v1/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-vqd-4", "vqd-rotated")
                .set_body_string("data: {\"message\":\"ok\"}\ndata: [DONE]\n"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Dialect::Sse);
    let turns = vec![ChatTurn::user("hi")];
    let exchange = client.chat("vqd-old", &turns, "gpt-4o-mini").await.unwrap();

    assert_eq!(exchange.refreshed_token.as_deref(), Some("vqd-rotated"));
}

#[tokio::test]
async fn test_chat_non_success_status_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/duckchat/v1/chat"))
        .respond_with(ResponseTemplate::new(418))
        .mount(&server)
        .await;

    let client = client_for(&server, Dialect::Sse);
    let turns = vec![ChatTurn::user("hi")];
    let err = client.chat("vqd", &turns, "gpt-4o-mini").await.unwrap_err();
    assert!(matches!(err, UpstreamError::Http { status: 418 }));
}

#[tokio::test]
async fn test_chat_duckchat_dialect_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/duckchat/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "data: {\"message\":\"Quack\"} data: {\"message\":\"!\"} [DONE]LIMT_CVRSA\n",
        ))
        .mount(&server)
        .await;

    let client = client_for(&server, Dialect::Duckchat);
    let turns = vec![ChatTurn::user("hi")];
    let exchange = client.chat("vqd", &turns, "gpt-4o-mini").await.unwrap();
    let reply = collect_reply(exchange.frames).await.unwrap();
    assert_eq!(reply, "Quack!");
}

#[tokio::test]
async fn test_chat_upstream_error_frame_surfaces_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/duckchat/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "data: {\"action\":\"error\",\"type\":\"ERR_RATELIMIT\",\"status\":429}\n",
        ))
        .mount(&server)
        .await;

    let client = client_for(&server, Dialect::Sse);
    let turns = vec![ChatTurn::user("hi")];
    let exchange = client.chat("vqd", &turns, "gpt-4o-mini").await.unwrap();
    let err = collect_reply(exchange.frames).await.unwrap_err();
    assert!(matches!(err, UpstreamError::RateLimit));
    assert_eq!(err.status_hint(), 429);
    assert_eq!(err.to_string(), "Rate limit exceeded");
}
