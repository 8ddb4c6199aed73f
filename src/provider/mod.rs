//! Vision-language providers
//!
//! The relay forwards one prompt and one inline image per request to a
//! [`VisionProvider`] and relays back the generated text.

mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;

use crate::Result;

/// MIME type attached to every forwarded frame
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// An image attached inline to a provider request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// MIME type of the encoded image
    pub mime_type: &'static str,
    /// Raw base64 (no data-URI prefix)
    pub data: String,
}

impl InlineImage {
    /// Wrap raw base64 JPEG data
    #[must_use]
    pub fn jpeg(data: impl Into<String>) -> Self {
        Self {
            mime_type: JPEG_MIME_TYPE,
            data: data.into(),
        }
    }
}

/// Trait for vision-language providers
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Generate text for a prompt and an inline image
    ///
    /// Awaits the full (non-streamed) result.
    ///
    /// # Errors
    ///
    /// Returns `Error::Provider` (or a transport error) if the call fails
    async fn generate(&self, prompt: &str, image: &InlineImage) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
