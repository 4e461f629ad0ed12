//! Integration tests for the session HTTP client

#![cfg(feature = "client")]

use serde_json::json;
use tabsession_core::client::{ClientError, SessionClient};
use tabsession_core::heartbeat::HeartbeatTransport;
use tabsession_core::scheduler::SessionApi;
use tabsession_core::{RefreshError, SessionConfig};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_client_builder() {
    let client = SessionClient::builder()
        .base_url("http://localhost:8080/")
        .build()
        .unwrap();

    assert_eq!(client.base_url(), "http://localhost:8080");
    assert_eq!(client.refresh_url(), "http://localhost:8080/auth/refresh");
    assert_eq!(client.heartbeat_url(), "http://localhost:8080/auth/heartbeat");
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = SessionClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));

    let result = SessionClient::from_config(&SessionConfig::default());
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_refresh_sends_current_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer old.token.value"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "new.token.value" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SessionClient::new(mock_server.uri()).unwrap();
    let renewed = client.refresh("old.token.value").await.unwrap();
    assert_eq!(renewed, "new.token.value");
}

#[tokio::test]
async fn test_refresh_unauthorized_is_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token revoked"))
        .mount(&mock_server)
        .await;

    let client = SessionClient::new(mock_server.uri()).unwrap();

    let err = client.refresh_token("a.b.c").await.unwrap_err();
    assert!(matches!(err, ClientError::AuthenticationFailed(ref m) if m == "token revoked"));

    let err = client.refresh("a.b.c").await.unwrap_err();
    assert_eq!(err, RefreshError::Rejected);
}

#[tokio::test]
async fn test_refresh_server_errors_are_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = SessionClient::new(mock_server.uri()).unwrap();

    let err = client.refresh_token("a.b.c").await.unwrap_err();
    assert!(matches!(err, ClientError::ServerError { status: 503, .. }));

    let err = client.refresh("a.b.c").await.unwrap_err();
    assert!(matches!(err, RefreshError::Transient(_)));
}

#[tokio::test]
async fn test_refresh_forbidden_is_not_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let client = SessionClient::new(mock_server.uri()).unwrap();
    let err = client.refresh("a.b.c").await.unwrap_err();
    assert!(matches!(err, RefreshError::Transient(_)));
}

#[tokio::test]
async fn test_refresh_malformed_body_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;
    let client = SessionClient::new(mock_server.uri()).unwrap();

    let err = client.refresh_token("a.b.c").await.unwrap_err();
    assert!(matches!(err, ClientError::MalformedResponse(_)));
    assert!(matches!(
        client.refresh("a.b.c").await,
        Err(RefreshError::Transient(_))
    ));
}

#[tokio::test]
async fn test_refresh_empty_token_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "" })))
        .mount(&mock_server)
        .await;

    let client = SessionClient::new(mock_server.uri()).unwrap();
    let err = client.refresh_token("a.b.c").await.unwrap_err();
    assert!(matches!(err, ClientError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_heartbeat_ignores_response_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/heartbeat"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SessionClient::new(mock_server.uri()).unwrap();
    assert!(client.send().await.is_ok());
}

#[tokio::test]
async fn test_unreachable_backend() {
    // Nothing listens on port 9 (discard) in the test environment.
    let client = SessionClient::builder()
        .base_url("http://127.0.0.1:9")
        .timeout(std::time::Duration::from_secs(2))
        .build()
        .unwrap();

    assert!(matches!(
        client.refresh("a.b.c").await,
        Err(RefreshError::Transient(_))
    ));
    assert!(client.send().await.is_err());
}
