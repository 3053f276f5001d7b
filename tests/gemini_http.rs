//! Gemini client over the keyed transport, against a local mock of the API.

use std::sync::Arc;

use geminigram::chatbot::gemini::{AiClient, AiErrorKind, GeminiClient, GeminiConfig};
use geminigram::transport::{KeyedProxyTransport, ProxyConfig, TransportConfig, TransportError};
use mockito::Matcher;

const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

fn client(api_base: String, key: &str) -> GeminiClient {
    let transport = KeyedProxyTransport::new(
        TransportConfig {
            api_key: key.to_string(),
            ..Default::default()
        },
        None,
    )
    .expect("direct transport");
    GeminiClient::new(
        GeminiConfig {
            api_base,
            ..Default::default()
        },
        Arc::new(transport),
    )
    .expect("gemini client")
}

#[tokio::test]
async fn test_text_prompt_carries_key_and_returns_answer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
        .match_header("content-type", "application/json")
        .match_body(Matcher::Regex(r#""text":"what is 2\+2""#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"4"}],"role":"model"}}]}"#)
        .create_async()
        .await;

    let answer = client(server.url(), "test-key")
        .handle_text_prompt("what is 2+2")
        .await
        .unwrap();

    assert_eq!(answer, "4");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_multiple_candidates_are_joined() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"candidates":[
                {"content":{"parts":[{"text":"a"},{"text":"b"}],"role":"model"}},
                {"finishReason":"RECITATION"},
                {"content":{"parts":[{"text":"c"}],"role":"model"}}
            ]}"#,
        )
        .create_async()
        .await;

    let answer = client(server.url(), "k").handle_text_prompt("letters").await.unwrap();
    assert_eq!(answer, "abc");
}

#[tokio::test]
async fn test_rejected_key_surfaces_upstream_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#)
        .create_async()
        .await;

    let err = client(server.url(), "bad").handle_text_prompt("hi").await.unwrap_err();
    assert_eq!(err.op, "handle_text_prompt");
    match err.kind {
        AiErrorKind::Upstream { status, message } => {
            assert_eq!(status, 400);
            assert!(message.starts_with("API key not valid"));
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error_without_key() {
    // Nothing listens on port 9 on loopback.
    let err = client("http://127.0.0.1:9".to_string(), "super-secret")
        .handle_text_prompt("hi")
        .await
        .unwrap_err();

    assert!(matches!(err.kind, AiErrorKind::Transport(_)));
    let rendered = format!("{err}");
    assert!(!rendered.contains("super-secret"), "key leaked: {rendered}");
}

#[tokio::test]
async fn test_malformed_proxy_never_reaches_the_api() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", GENERATE_PATH)
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let result = KeyedProxyTransport::new(
        TransportConfig {
            api_key: "k".to_string(),
            proxy: Some(ProxyConfig {
                url: "http://[::1".to_string(),
                username: "alice".to_string(),
                password: "secret".to_string(),
            }),
            timeout: None,
        },
        None,
    );

    assert!(matches!(result, Err(TransportError::Configuration { .. })));
    mock.assert_async().await;
}
