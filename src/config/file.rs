//! TOML configuration file loading
//!
//! Supports `~/.config/sightline/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SightlineConfigFile {
    /// Vision-language provider settings
    #[serde(default)]
    pub provider: ProviderFileConfig,

    /// Relay server settings
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Prompt composition settings
    #[serde(default)]
    pub prompt: PromptFileConfig,

    /// Capture client settings
    #[serde(default)]
    pub client: ClientFileConfig,
}

/// Provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct ProviderFileConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Relay server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Prompt composition configuration
#[derive(Debug, Default, Deserialize)]
pub struct PromptFileConfig {
    /// Language the model is told to answer in (e.g. "Bahasa Indonesia")
    pub language: Option<String>,

    /// "plain" or "casual"
    pub style: Option<String>,
}

/// Capture client configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    pub relay_url: Option<String>,
    pub prompt: Option<String>,
    pub voice_locale: Option<String>,
    pub voice_fallback_language: Option<String>,
    pub camera_device: Option<String>,
    pub jpeg_quality: Option<u8>,
}

/// Load the TOML config file from the standard path
///
/// Returns `SightlineConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SightlineConfigFile {
    config_file_path().map_or_else(SightlineConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> SightlineConfigFile {
    if !path.exists() {
        return SightlineConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                SightlineConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SightlineConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/sightline/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("sightline").join("config.toml"))
}
