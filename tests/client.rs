//! Relay client against an in-process relay server

use sightline_relay::{Error, RelayClient};

mod common;
use common::{MockProvider, build_router, spawn_server};

#[tokio::test]
async fn test_client_round_trip() {
    let provider = MockProvider::replying("Ada **dua** cangkir kopi.");
    let addr = spawn_server(build_router(Some(provider.clone()))).await;

    let client = RelayClient::new(&format!("http://{addr}/gemini-vision")).unwrap();
    let text = client.send("/9j/AAAA", "Apa ini?").await.unwrap();

    assert_eq!(text, "Ada **dua** cangkir kopi.");
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test]
async fn test_client_surfaces_relay_status_and_body() {
    let addr = spawn_server(build_router(Some(MockProvider::replying("unused")))).await;
    let client = RelayClient::new(&format!("http://{addr}/gemini-vision")).unwrap();

    let err = client.send("", "Apa ini?").await.unwrap_err();
    match err {
        Error::Relay { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("image is required"));
        }
        other => panic!("expected relay error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_missing_key_is_relay_500() {
    let addr = spawn_server(build_router(None)).await;
    let client = RelayClient::new(&format!("http://{addr}/api/gemini-vision")).unwrap();

    let err = client.send("/9j/AAAA", "Apa ini?").await.unwrap_err();
    assert!(matches!(err, Error::Relay { status: 500, .. }));
}

#[tokio::test]
async fn test_client_rejects_body_without_text() {
    use axum::{Json, Router, routing::post};

    let router = Router::new().route(
        "/gemini-vision",
        post(|| async { Json(serde_json::json!({"candidates": []})) }),
    );
    let addr = spawn_server(router).await;
    let client = RelayClient::new(&format!("http://{addr}/gemini-vision")).unwrap();

    let err = client.send("/9j/AAAA", "Apa ini?").await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));
}
