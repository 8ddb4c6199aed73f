//! Single-invocation deployment of the relay
//!
//! Each invocation is handled start to finish by one process, CGI style:
//! the method comes from `REQUEST_METHOD`, the body from stdin, and the
//! response (status line, headers, body) goes to stdout. The API key is looked
//! up per invocation, so a missing key is a per-request 500 rather than a
//! startup failure.

use std::io::Write;
use std::sync::Arc;

use axum::http::StatusCode;
use secrecy::SecretString;

use crate::Result;
use crate::provider::VisionProvider;
use crate::relay::{PromptStyle, RelayError, RelayService};

/// One function invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub method: String,
    pub body: Vec<u8>,
}

/// Response produced by one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl FunctionResponse {
    fn json(status: StatusCode, body: &impl serde::Serialize) -> Self {
        // Serializing the relay's own plain structs cannot fail
        let body = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    fn from_error(error: &RelayError) -> Self {
        match error.body() {
            Some(body) => Self::json(error.status(), &body),
            None => Self {
                status: error.status(),
                content_type: "text/plain; charset=utf-8",
                body: "Method Not Allowed".to_string(),
            },
        }
    }

    /// Write the response in CGI/1.1 form
    ///
    /// # Errors
    ///
    /// Returns error if the writer fails
    pub fn write_cgi(&self, out: &mut impl Write) -> std::io::Result<()> {
        write!(
            out,
            "Status: {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or_default(),
            self.content_type,
            self.body.len(),
            self.body
        )?;
        out.flush()
    }
}

/// Builds a provider from an API key
pub type Connector = Box<dyn Fn(SecretString) -> Result<Arc<dyn VisionProvider>> + Send + Sync>;

/// Per-invocation relay handler
pub struct FunctionHandler {
    connect: Connector,
    style: PromptStyle,
    language: String,
}

impl FunctionHandler {
    /// Create a handler; `connect` is called once per invocation that has a key
    #[must_use]
    pub fn new(connect: Connector, style: PromptStyle, language: impl Into<String>) -> Self {
        Self {
            connect,
            style,
            language: language.into(),
        }
    }

    /// Handle one invocation
    pub async fn invoke(
        &self,
        invocation: Invocation,
        api_key: Option<SecretString>,
    ) -> FunctionResponse {
        if !invocation.method.eq_ignore_ascii_case("POST") {
            tracing::debug!(method = %invocation.method, "rejecting non-POST invocation");
            return FunctionResponse::from_error(&RelayError::MethodNotAllowed);
        }

        let provider = match api_key.map(|key| (self.connect)(key)).transpose() {
            Ok(provider) => provider,
            Err(e) => {
                tracing::error!(error = %e, "failed to initialize vision provider");
                return FunctionResponse::from_error(&RelayError::Config(e.to_string()));
            }
        };

        let relay = RelayService::new(provider, self.style, self.language.clone());
        match relay.handle_body(&invocation.body).await {
            Ok(response) => FunctionResponse::json(StatusCode::OK, &response),
            Err(e) => FunctionResponse::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::provider::InlineImage;

    struct EchoProvider;

    #[async_trait]
    impl VisionProvider for EchoProvider {
        async fn generate(&self, prompt: &str, image: &InlineImage) -> Result<String> {
            Ok(format!("{} bytes; {prompt}", image.data.len()))
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    fn handler(connects: Arc<AtomicUsize>) -> FunctionHandler {
        FunctionHandler::new(
            Box::new(move |_key| {
                connects.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(EchoProvider) as Arc<dyn VisionProvider>)
            }),
            PromptStyle::Casual,
            "Bahasa Indonesia",
        )
    }

    fn post(body: &str) -> Invocation {
        Invocation {
            method: "POST".to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn key() -> Option<SecretString> {
        Some(SecretString::from("test-key".to_string()))
    }

    #[tokio::test]
    async fn success_uses_canonical_text_field() {
        let handler = handler(Arc::new(AtomicUsize::new(0)));
        let response = handler
            .invoke(post(r#"{"image":"data:image/jpeg;base64,QUJD","prompt":"Apa ini?"}"#), key())
            .await;

        assert_eq!(response.status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        let text = json["text"].as_str().unwrap();
        assert!(text.starts_with("4 bytes; Jawab dalam Bahasa Indonesia dengan gaya bahasa"));
        assert!(text.ends_with("Apa ini?"));
        assert!(json.get("geminiResponse").is_none());
    }

    #[tokio::test]
    async fn get_is_method_not_allowed() {
        let connects = Arc::new(AtomicUsize::new(0));
        let response = handler(connects.clone())
            .invoke(
                Invocation {
                    method: "GET".to_string(),
                    body: Vec::new(),
                },
                key(),
            )
            .await;

        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.body, "Method Not Allowed");
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_key_is_per_request_config_error() {
        let connects = Arc::new(AtomicUsize::new(0));
        let response = handler(connects.clone())
            .invoke(post(r#"{"image":"QUJD","prompt":"Apa ini?"}"#), None)
            .await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("GEMINI_API_KEY"));
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_prompt_is_bad_request() {
        let response = handler(Arc::new(AtomicUsize::new(0)))
            .invoke(post(r#"{"image":"QUJD"}"#), key())
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert!(!json["error"].as_str().unwrap().is_empty());
    }

    #[test]
    fn cgi_output_has_status_and_length() {
        let response = FunctionResponse {
            status: StatusCode::OK,
            content_type: "application/json",
            body: r#"{"text":"hai"}"#.to_string(),
        };
        let mut out = Vec::new();
        response.write_cgi(&mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Status: 200 OK\r\n"));
        assert!(out.contains("Content-Length: 14\r\n"));
        assert!(out.ends_with("\r\n\r\n{\"text\":\"hai\"}"));
    }
}
