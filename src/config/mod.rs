//! Configuration management for Sightline
//!
//! Values resolve as env > TOML file > default.

pub mod file;

use secrecy::SecretString;

use crate::relay::PromptStyle;
use crate::{Error, Result};

use self::file::SightlineConfigFile;

/// Environment variable holding the provider API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini API base URL
pub const DEFAULT_PROVIDER_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default relay endpoint the capture client posts to
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3000/gemini-vision";

/// Default prompt sent with each captured frame
pub const DEFAULT_CAPTURE_PROMPT: &str =
    "Jelaskan apa yang Anda lihat di gambar ini secara detail.";

/// Sightline configuration
#[derive(Debug)]
pub struct Config {
    /// Vision-language provider configuration
    pub provider: ProviderConfig,

    /// Relay server configuration
    pub server: ServerConfig,

    /// Prompt composition configuration
    pub prompt: PromptConfig,

    /// Capture client configuration
    pub client: ClientConfig,
}

/// Provider configuration
#[derive(Debug)]
pub struct ProviderConfig {
    /// API key (`GEMINI_API_KEY`); absence is a configuration error for the relay
    pub api_key: Option<SecretString>,

    /// Model identifier
    pub model: String,

    /// API base URL
    pub base_url: String,
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Prompt composition configuration
#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// Language the model is instructed to answer in
    pub language: String,

    /// Explicit style; `None` lets each deployment shape pick its own default
    pub style: Option<PromptStyle>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            language: "Bahasa Indonesia".to_string(),
            style: None,
        }
    }
}

/// Capture client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay endpoint URL
    pub relay_url: String,

    /// Prompt sent with every capture
    pub prompt: String,

    /// Target speech locale (BCP 47, e.g. "id-ID")
    pub voice_locale: String,

    /// Fallback language family for persona voices (e.g. "en")
    pub voice_fallback_language: String,

    /// Camera device (e.g. "/dev/video0"); platform default when unset
    pub camera_device: Option<String>,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            prompt: DEFAULT_CAPTURE_PROMPT.to_string(),
            voice_locale: "id-ID".to_string(),
            voice_fallback_language: "en".to_string(),
            camera_device: None,
            jpeg_quality: crate::capture::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Config {
    /// Load configuration from the process environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly set value is invalid
    pub fn load() -> Result<Self> {
        Self::from_sources(|key| std::env::var(key).ok(), file::load_config_file())
    }

    /// Build configuration from an env lookup and a parsed config file
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly set value is invalid
    pub fn from_sources<F>(env: F, fc: SightlineConfigFile) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = env(API_KEY_ENV)
            .or(fc.provider.api_key)
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let provider = ProviderConfig {
            api_key,
            model: env("SIGHTLINE_MODEL")
                .or(fc.provider.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env("SIGHTLINE_PROVIDER_URL")
                .or(fc.provider.base_url)
                .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
        };

        let port = match env("SIGHTLINE_PORT").or_else(|| env("PORT")) {
            Some(raw) => Some(
                raw.parse::<u16>()
                    .map_err(|e| Error::Config(format!("invalid port {raw:?}: {e}")))?,
            ),
            None => fc.server.port,
        };
        let server = ServerConfig {
            host: env("SIGHTLINE_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: port.unwrap_or(3000),
        };

        let style = env("SIGHTLINE_PROMPT_STYLE")
            .or(fc.prompt.style)
            .map(|s| s.parse::<PromptStyle>())
            .transpose()?;
        let prompt_defaults = PromptConfig::default();
        let prompt = PromptConfig {
            language: env("SIGHTLINE_LANGUAGE")
                .or(fc.prompt.language)
                .unwrap_or(prompt_defaults.language),
            style,
        };

        let client_defaults = ClientConfig::default();
        let jpeg_quality = fc.client.jpeg_quality.unwrap_or(client_defaults.jpeg_quality);
        if !(1..=100).contains(&jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg_quality must be between 1 and 100, got {jpeg_quality}"
            )));
        }
        let client = ClientConfig {
            relay_url: env("SIGHTLINE_RELAY_URL")
                .or(fc.client.relay_url)
                .unwrap_or(client_defaults.relay_url),
            prompt: env("SIGHTLINE_PROMPT")
                .or(fc.client.prompt)
                .unwrap_or(client_defaults.prompt),
            voice_locale: env("SIGHTLINE_VOICE_LOCALE")
                .or(fc.client.voice_locale)
                .unwrap_or(client_defaults.voice_locale),
            voice_fallback_language: fc
                .client
                .voice_fallback_language
                .unwrap_or(client_defaults.voice_fallback_language),
            camera_device: env("SIGHTLINE_CAMERA_DEVICE").or(fc.client.camera_device),
            jpeg_quality,
        };

        Ok(Self {
            provider,
            server,
            prompt,
            client,
        })
    }

    /// Return the provider API key or a configuration error
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when no key is configured
    pub fn require_api_key(&self) -> Result<&SecretString> {
        self.provider
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config(format!("{API_KEY_ENV} is not set")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env_or_file() {
        let config = Config::from_sources(env_from(&[]), SightlineConfigFile::default()).unwrap();

        assert!(config.provider.api_key.is_none());
        assert_eq!(config.provider.model, DEFAULT_MODEL);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.prompt.language, "Bahasa Indonesia");
        assert!(config.prompt.style.is_none());
        assert_eq!(config.client.relay_url, DEFAULT_RELAY_URL);
        assert_eq!(config.client.jpeg_quality, 80);
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut fc = SightlineConfigFile::default();
        fc.provider.api_key = Some("from-file".to_string());
        fc.server.port = Some(4000);

        let config = Config::from_sources(
            env_from(&[(API_KEY_ENV, "from-env"), ("SIGHTLINE_PORT", "5000")]),
            fc,
        )
        .unwrap();

        assert_eq!(config.require_api_key().unwrap().expose_secret(), "from-env");
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn file_used_when_env_missing() {
        let mut fc = SightlineConfigFile::default();
        fc.provider.api_key = Some("from-file".to_string());
        fc.prompt.style = Some("casual".to_string());

        let config = Config::from_sources(env_from(&[]), fc).unwrap();

        assert_eq!(config.require_api_key().unwrap().expose_secret(), "from-file");
        assert_eq!(config.prompt.style, Some(PromptStyle::Casual));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config =
            Config::from_sources(env_from(&[(API_KEY_ENV, "  ")]), SightlineConfigFile::default())
                .unwrap();
        assert!(config.provider.api_key.is_none());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = Config::from_sources(
            env_from(&[("SIGHTLINE_PORT", "not-a-port")]),
            SightlineConfigFile::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn invalid_style_is_rejected() {
        let err = Config::from_sources(
            env_from(&[("SIGHTLINE_PROMPT_STYLE", "shouty")]),
            SightlineConfigFile::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn out_of_range_jpeg_quality_is_rejected() {
        let mut fc = SightlineConfigFile::default();
        fc.client.jpeg_quality = Some(0);
        assert!(Config::from_sources(env_from(&[]), fc).is_err());
    }
}
