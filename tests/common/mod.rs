//! Shared test utilities

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sightline_relay::provider::{InlineImage, VisionProvider};
use sightline_relay::{ApiState, Error, PromptStyle, RelayService, Result};

/// A call seen by [`MockProvider`]
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub mime_type: &'static str,
    pub data: String,
}

/// Provider that records every call and answers with a fixed reply or failure
pub struct MockProvider {
    reply: std::result::Result<String, String>,
    calls: Mutex<Vec<Call>>,
}

impl MockProvider {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionProvider for MockProvider {
    async fn generate(&self, prompt: &str, image: &InlineImage) -> Result<String> {
        self.calls.lock().unwrap().push(Call {
            prompt: prompt.to_string(),
            mime_type: image.mime_type,
            data: image.data.clone(),
        });
        self.reply.clone().map_err(Error::Provider)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Build the full relay router around an optional provider
pub fn build_router(provider: Option<Arc<MockProvider>>) -> axum::Router {
    let provider = provider.map(|p| p as Arc<dyn VisionProvider>);
    let relay = RelayService::new(provider, PromptStyle::Plain, "Bahasa Indonesia");
    sightline_relay::api::router(Arc::new(ApiState { relay }))
}

/// Serve a router on an ephemeral local port
pub async fn spawn_server(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });
    addr
}
