//! Target-language prompt composition

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// How the language instruction is attached to the user's prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    /// Prompt followed by a short "answer in <language>" instruction
    Plain,
    /// Casual, friendly tone with `**bold**` emphasis, placed before the prompt
    Casual,
}

impl PromptStyle {
    /// Compose the prompt forwarded to the provider
    #[must_use]
    pub fn compose(self, prompt: &str, language: &str) -> String {
        match self {
            Self::Plain => format!("{prompt} Jawab dalam {language}."),
            Self::Casual => format!(
                "Jawab dalam {language} dengan gaya bahasa yang santai/gaul, seolah sedang \
                 ngobrol sama temen. Gunakan tanda bintang ganda (**) untuk membuat kata atau \
                 frasa penting menjadi tebal. {prompt}"
            ),
        }
    }
}

impl FromStr for PromptStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "casual" => Ok(Self::Casual),
            other => Err(Error::Config(format!(
                "unknown prompt style {other:?} (expected \"plain\" or \"casual\")"
            ))),
        }
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::Casual => "casual",
        })
    }
}
