//! Voice output
//!
//! Speaks relay responses through a platform synthesizer. The voice is
//! picked by [`VoiceSelector`], an ordered list of predicate rules.

mod espeak;
mod select;

pub use espeak::EspeakSpeech;
pub use select::{VoiceRule, VoiceSelector, lang_in_family, lang_matches, signals_persona};

use async_trait::async_trait;

use crate::Result;

/// Voice gender as reported by the synthesizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

/// A synthesis voice offered by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Identifier passed back to the synthesizer
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Language tag (BCP 47-ish, e.g. "id", "en-gb")
    pub lang: String,
    pub gender: Option<Gender>,
    /// Whether this is the platform's default voice
    pub is_default: bool,
}

/// What to speak with: a selected voice and/or a language
#[derive(Debug, Clone, Default)]
pub struct VoiceHint {
    pub voice: Option<Voice>,
    pub lang: String,
}

/// Capability interface for speech synthesis
#[async_trait]
pub trait SpeechOutput: Send {
    /// Voices available on this platform
    ///
    /// # Errors
    ///
    /// Returns `Error::Speech` if the synthesizer cannot be queried
    async fn voices(&self) -> Result<Vec<Voice>>;

    /// Start speaking `text`; returns once speech has started
    ///
    /// An utterance still in flight is replaced.
    ///
    /// # Errors
    ///
    /// Returns `Error::Speech` if synthesis cannot start
    async fn speak(&mut self, text: &str, hint: &VoiceHint) -> Result<()>;

    /// Cancel any in-flight utterance; no-op when silent
    async fn stop(&mut self);

    /// Synthesizer name for logging
    fn name(&self) -> &'static str;
}

/// Speech output that says nothing (no synthesizer installed, or `--mute`)
pub struct MutedSpeech;

#[async_trait]
impl SpeechOutput for MutedSpeech {
    async fn voices(&self) -> Result<Vec<Voice>> {
        Ok(Vec::new())
    }

    async fn speak(&mut self, text: &str, _hint: &VoiceHint) -> Result<()> {
        tracing::debug!(chars = text.len(), "speech muted");
        Ok(())
    }

    async fn stop(&mut self) {}

    fn name(&self) -> &'static str {
        "muted"
    }
}

/// Remove `**` emphasis markup so it isn't read aloud
#[must_use]
pub fn strip_markup(text: &str) -> String {
    text.replace("**", "")
}
