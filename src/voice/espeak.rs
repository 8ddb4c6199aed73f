//! Speech through `espeak-ng` (or classic `espeak`)

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use super::{Gender, SpeechOutput, Voice, VoiceHint};
use crate::{Error, Result};

const BINARIES: [&str; 2] = ["espeak-ng", "espeak"];

/// Speech synthesizer backed by an espeak child process
pub struct EspeakSpeech {
    binary: PathBuf,
    current: Option<Child>,
}

impl EspeakSpeech {
    /// Find espeak-ng or espeak on PATH
    ///
    /// # Errors
    ///
    /// Returns `Error::Speech` if neither binary is installed
    pub fn locate() -> Result<Self> {
        BINARIES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(Self::with_binary)
            .ok_or_else(|| Error::Speech("espeak-ng or espeak not found on PATH".to_string()))
    }

    #[must_use]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            current: None,
        }
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn kill_current(&mut self) {
        if let Some(mut child) = self.current.take() {
            // Already-exited children report an error here; nothing to do
            let _ = child.kill().await;
        }
    }
}

#[async_trait]
impl SpeechOutput for EspeakSpeech {
    async fn voices(&self) -> Result<Vec<Voice>> {
        let output = Command::new(&self.binary)
            .arg("--voices")
            .output()
            .await
            .map_err(|e| Error::Speech(format!("failed to list voices: {e}")))?;

        if !output.status.success() {
            return Err(Error::Speech(format!("voice listing exited with {}", output.status)));
        }

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn speak(&mut self, text: &str, hint: &VoiceHint) -> Result<()> {
        self.kill_current().await;

        let voice = voice_arg(hint);
        let mut command = Command::new(&self.binary);
        if let Some(voice) = &voice {
            command.args(["-v", voice]);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Speech(format!("failed to start {}: {e}", self.binary.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        tracing::debug!(
            voice = voice.as_deref().unwrap_or("default"),
            chars = text.len(),
            "speaking"
        );
        self.current = Some(child);
        Ok(())
    }

    async fn stop(&mut self) {
        self.kill_current().await;
    }

    fn name(&self) -> &'static str {
        "espeak"
    }
}

/// Voice argument for a hint: the voice id, else the primary language subtag
fn voice_arg(hint: &VoiceHint) -> Option<String> {
    if let Some(voice) = &hint.voice {
        return Some(voice.id.clone());
    }

    hint.lang
        .split(['-', '_'])
        .next()
        .filter(|lang| !lang.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Parse `espeak --voices` output
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  id              --/M      Indonesian         roa/id
/// ```
fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let lang = cols.next()?;
            let age_gender = cols.next()?;
            let name = cols.next()?;
            let file = cols.next()?;

            let gender = match age_gender.rsplit('/').next() {
                Some("M") => Some(Gender::Male),
                Some("F") => Some(Gender::Female),
                _ => None,
            };

            Some(Voice {
                id: lang.to_string(),
                name: name.replace('_', " "),
                lang: lang.to_string(),
                gender,
                is_default: file.rsplit('/').next() == Some("en"),
            })
        })
        .collect()
}
