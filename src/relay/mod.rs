//! Vision relay core
//!
//! Shared by both deployment shapes (the long-running server in [`crate::api`]
//! and the single-invocation handler in [`crate::function`]). A request is
//! validated, its image normalized to raw base64, its prompt given the
//! target-language instruction, and the pair forwarded to the provider exactly
//! once. Nothing is cached; identical requests always reach the provider.

pub mod prompt;

pub use prompt::PromptStyle;

use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::API_KEY_ENV;
use crate::provider::{InlineImage, VisionProvider};

/// Incoming relay request as it arrives on the wire
///
/// Both fields are optional here so that absence is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisionRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Canonical success body for every deployment shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionResponse {
    pub text: String,
}

/// A request that passed validation, with the image already normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub image: String,
    pub prompt: String,
}

impl VisionRequest {
    /// Parse a raw JSON body
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Validation` if the body is not a JSON object with
    /// string-typed fields
    pub fn from_json(body: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice(body)
            .map_err(|e| RelayError::Validation(format!("invalid JSON body: {e}")))
    }

    /// Check that both fields are present and non-empty
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Validation` naming the missing field(s)
    pub fn validate(self) -> Result<ValidatedRequest, RelayError> {
        let image = self
            .image
            .as_deref()
            .map(normalize_image)
            .filter(|i| !i.is_empty())
            .map(str::to_string);
        let prompt = self.prompt.filter(|p| !p.is_empty());

        match (image, prompt) {
            (Some(image), Some(prompt)) => Ok(ValidatedRequest { image, prompt }),
            (None, None) => Err(RelayError::Validation(
                "image and prompt are required".to_string(),
            )),
            (None, Some(_)) => Err(RelayError::Validation("image is required".to_string())),
            (Some(_), None) => Err(RelayError::Validation("prompt is required".to_string())),
        }
    }
}

/// Strip a `data:<mime>;base64,` prefix if present
///
/// Idempotent: bare base64 is returned unchanged.
#[must_use]
pub fn normalize_image(image: &str) -> &str {
    image
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .map_or(image, |(_, data)| data)
}

/// Error surfaced at the relay boundary, mapped to an HTTP status and JSON body
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Missing or malformed request fields (400)
    #[error("{0}")]
    Validation(String),
    /// Provider credentials not configured (500)
    #[error("{0}")]
    Config(String),
    /// The provider call failed (500, with details)
    #[error("{error}: {details}")]
    Provider { error: String, details: String },
    /// Anything but POST (405)
    #[error("Method Not Allowed")]
    MethodNotAllowed,
}

/// JSON error body: `{ "error": ..., "details"?: ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RelayError {
    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Provider { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// JSON body for this error; `None` for 405, which carries plain text
    #[must_use]
    pub fn body(&self) -> Option<ErrorBody> {
        match self {
            Self::Validation(message) | Self::Config(message) => Some(ErrorBody {
                error: message.clone(),
                details: None,
            }),
            Self::Provider { error, details } => Some(ErrorBody {
                error: error.clone(),
                details: Some(details.clone()),
            }),
            Self::MethodNotAllowed => None,
        }
    }
}

/// The relay: one validated request in, one provider call, one response out
pub struct RelayService {
    provider: Option<Arc<dyn VisionProvider>>,
    style: PromptStyle,
    language: String,
}

impl RelayService {
    /// Create a relay
    ///
    /// A `None` provider means no API key is configured; every valid request
    /// then fails with a configuration error without reaching any provider.
    #[must_use]
    pub fn new(
        provider: Option<Arc<dyn VisionProvider>>,
        style: PromptStyle,
        language: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            style,
            language: language.into(),
        }
    }

    /// Whether a provider is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Prompt style in use
    #[must_use]
    pub const fn style(&self) -> PromptStyle {
        self.style
    }

    /// Parse a raw JSON body and handle it
    ///
    /// # Errors
    ///
    /// See [`RelayService::handle`]
    pub async fn handle_body(&self, body: &[u8]) -> Result<VisionResponse, RelayError> {
        let request = VisionRequest::from_json(body)?;
        self.handle(request).await
    }

    /// Handle a relay request
    ///
    /// # Errors
    ///
    /// - `Validation` if `image` or `prompt` is missing or empty
    /// - `Config` if no provider is configured
    /// - `Provider` if the provider call fails
    pub async fn handle(&self, request: VisionRequest) -> Result<VisionResponse, RelayError> {
        let request = request.validate()?;

        let provider = self.provider.as_ref().ok_or_else(|| {
            tracing::error!("relay request rejected: {API_KEY_ENV} is not configured");
            RelayError::Config(format!("{API_KEY_ENV} is not configured"))
        })?;

        let prompt = self.style.compose(&request.prompt, &self.language);
        let image = InlineImage::jpeg(request.image);

        tracing::debug!(
            provider = provider.name(),
            style = %self.style,
            prompt_len = prompt.len(),
            image_len = image.data.len(),
            "forwarding vision request"
        );

        match provider.generate(&prompt, &image).await {
            Ok(text) => Ok(VisionResponse { text }),
            Err(e) => {
                tracing::error!(
                    provider = provider.name(),
                    error = %e,
                    "vision provider call failed"
                );
                Err(RelayError::Provider {
                    error: "failed to process the request with the vision provider".to_string(),
                    details: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{Error, Result};

    /// Records every call and answers with a canned result
    struct RecordingProvider {
        calls: Mutex<Vec<(String, InlineImage)>>,
        fail: bool,
    }

    impl RecordingProvider {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn calls(&self) -> Vec<(String, InlineImage)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VisionProvider for RecordingProvider {
        async fn generate(&self, prompt: &str, image: &InlineImage) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), image.clone()));
            if self.fail {
                Err(Error::Provider("quota exceeded".to_string()))
            } else {
                Ok("Seekor kucing di atas meja.".to_string())
            }
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn request(image: Option<&str>, prompt: Option<&str>) -> VisionRequest {
        VisionRequest {
            image: image.map(str::to_string),
            prompt: prompt.map(str::to_string),
        }
    }

    fn relay(provider: &Arc<RecordingProvider>) -> RelayService {
        RelayService::new(
            Some(provider.clone() as Arc<dyn VisionProvider>),
            PromptStyle::Plain,
            "Bahasa Indonesia",
        )
    }

    #[test]
    fn normalize_strips_data_uri_prefix() {
        assert_eq!(normalize_image("data:image/jpeg;base64,XYZ"), "XYZ");
        assert_eq!(normalize_image("data:image/png;base64,XYZ"), "XYZ");
    }

    #[test]
    fn normalize_is_idempotent_on_bare_base64() {
        assert_eq!(normalize_image("XYZ"), "XYZ");
        assert_eq!(normalize_image(normalize_image("data:image/jpeg;base64,XYZ")), "XYZ");
    }

    #[test]
    fn validate_reports_missing_fields() {
        let both = request(None, None).validate().unwrap_err();
        assert_eq!(both, RelayError::Validation("image and prompt are required".to_string()));

        let no_image = request(None, Some("Describe")).validate().unwrap_err();
        assert_eq!(no_image.status(), StatusCode::BAD_REQUEST);

        let no_prompt = request(Some("XYZ"), Some("")).validate().unwrap_err();
        assert_eq!(no_prompt, RelayError::Validation("prompt is required".to_string()));
    }

    #[test]
    fn whitespace_fields_are_present() {
        let validated = request(Some("XYZ"), Some(" ")).validate().unwrap();
        assert_eq!(validated.prompt, " ");

        let err = request(Some(" "), None).validate().unwrap_err();
        assert_eq!(err, RelayError::Validation("prompt is required".to_string()));
    }

    #[test]
    fn display_matches_error_body() {
        let err = RelayError::Provider {
            error: "failed".to_string(),
            details: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "failed: boom");
        assert_eq!(RelayError::MethodNotAllowed.to_string(), "Method Not Allowed");
    }

    #[test]
    fn prefix_only_image_is_empty() {
        let err = request(Some("data:image/jpeg;base64,"), Some("Describe"))
            .validate()
            .unwrap_err();
        assert_eq!(err, RelayError::Validation("image is required".to_string()));
    }

    #[test]
    fn from_json_rejects_non_string_fields() {
        let err = VisionRequest::from_json(br#"{"image": 42, "prompt": "x"}"#).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_bodies() {
        let provider_err = RelayError::Provider {
            error: "failed".to_string(),
            details: "boom".to_string(),
        };
        let body = serde_json::to_value(provider_err.body().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "failed", "details": "boom" }));

        let validation = serde_json::to_value(
            RelayError::Validation("image is required".to_string())
                .body()
                .unwrap(),
        )
        .unwrap();
        assert!(validation.get("details").is_none());

        assert!(RelayError::MethodNotAllowed.body().is_none());
        assert_eq!(RelayError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn forwards_normalized_image_and_composed_prompt() {
        let provider = RecordingProvider::new(false);
        let relay = relay(&provider);

        let response = relay
            .handle(request(Some("data:image/jpeg;base64,XYZ"), Some("Describe this")))
            .await
            .unwrap();
        assert_eq!(response.text, "Seekor kucing di atas meja.");

        let response = relay
            .handle(request(Some("XYZ"), Some("Describe this")))
            .await
            .unwrap();
        assert!(!response.text.is_empty());

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        for (prompt, image) in calls {
            assert_eq!(prompt, "Describe this Jawab dalam Bahasa Indonesia.");
            assert_eq!(image, InlineImage::jpeg("XYZ"));
            assert_eq!(image.mime_type, "image/jpeg");
        }
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_provider() {
        let provider = RecordingProvider::new(false);
        let relay = relay(&provider);

        let err = relay.handle(request(None, Some("Describe"))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_provider_is_config_error() {
        let relay = RelayService::new(None, PromptStyle::Plain, "Bahasa Indonesia");
        assert!(!relay.is_configured());

        let err = relay
            .handle(request(Some("XYZ"), Some("Describe")))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn validation_precedes_config_check() {
        let relay = RelayService::new(None, PromptStyle::Plain, "Bahasa Indonesia");
        let err = relay.handle(request(None, None)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn provider_failure_carries_details() {
        let provider = RecordingProvider::new(true);
        let relay = relay(&provider);

        let err = relay
            .handle(request(Some("XYZ"), Some("Describe")))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.body().unwrap();
        assert!(body.details.unwrap().contains("quota exceeded"));
        assert_eq!(provider.calls().len(), 1);
    }
}
