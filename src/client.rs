//! Relay client: posts a captured frame and prompt to the relay

use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// Client for the relay's `{image, prompt}` -> `{text}` contract
#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    url: url::Url,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    image: &'a str,
    prompt: &'a str,
}

impl RelayClient {
    /// Create a client for a relay endpoint
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the URL is not a valid http(s) URL
    pub fn new(url: &str) -> Result<Self> {
        let url = url::Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid relay URL {url:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "relay URL must be http or https, got {}",
                url.scheme()
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }

    /// Relay endpoint
    #[must_use]
    pub const fn url(&self) -> &url::Url {
        &self.url
    }

    /// Send one frame and prompt, returning the model's text
    ///
    /// One POST, no retry, platform-default timeouts.
    ///
    /// # Errors
    ///
    /// - `Error::Relay` on a non-success status (with the response body)
    /// - `Error::MalformedResponse` if the body lacks a string `text` field
    /// - `Error::Http` on transport failure
    pub async fn send(&self, image: &str, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&RelayRequest { image, prompt })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Relay {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        parse_text(&body)
    }
}

/// Extract the `text` field from a relay success body
fn parse_text(body: &[u8]) -> Result<String> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedResponse(format!("body is not JSON: {e}")))?;

    match value.get("text") {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(Error::MalformedResponse(format!(
            "`text` is not a string: {other}"
        ))),
        None => Err(Error::MalformedResponse("missing `text` field".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_urls() {
        assert!(matches!(RelayClient::new("not a url"), Err(Error::Config(_))));
        assert!(matches!(
            RelayClient::new("ftp://localhost/gemini-vision"),
            Err(Error::Config(_))
        ));
        assert!(RelayClient::new("http://localhost:3000/gemini-vision").is_ok());
    }

    #[test]
    fn parse_text_accepts_canonical_body() {
        assert_eq!(parse_text(br#"{"text":"Halo"}"#).unwrap(), "Halo");
    }

    #[test]
    fn parse_text_rejects_other_shapes() {
        let legacy = br#"{"message":"Success","geminiResponse":"Halo"}"#;
        assert!(matches!(parse_text(legacy), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_text(br#"{"text":42}"#), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_text(b"<html>"), Err(Error::MalformedResponse(_))));
    }
}
