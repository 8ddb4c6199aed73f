//! Voice selection as a prioritized rule list
//!
//! Name- and metadata-based matching is best effort; the first rule with a
//! matching voice wins.

use super::{Gender, Voice};

type Predicate = Box<dyn Fn(&Voice) -> bool + Send + Sync>;

/// One named selection rule
pub struct VoiceRule {
    name: &'static str,
    predicate: Predicate,
}

impl VoiceRule {
    #[must_use]
    pub fn new(
        name: &'static str,
        predicate: impl Fn(&Voice) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            predicate: Box::new(predicate),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn matches(&self, voice: &Voice) -> bool {
        (self.predicate)(voice)
    }
}

/// Ordered voice selection rules
#[derive(Default)]
pub struct VoiceSelector {
    rules: Vec<VoiceRule>,
}

impl VoiceSelector {
    /// Empty selector; add rules with [`VoiceSelector::rule`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule (lower precedence than those already added)
    #[must_use]
    pub fn rule(mut self, rule: VoiceRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Standard rules for a target locale and fallback language family:
    ///
    /// 1. locale or family voice with a masculine/young persona
    /// 2. any voice for the locale
    /// 3. the platform default
    #[must_use]
    pub fn for_locale(locale: &str, fallback_family: &str) -> Self {
        let persona_locale = locale.to_string();
        let persona_family = fallback_family.to_string();
        let any_locale = locale.to_string();

        Self::new()
            .rule(VoiceRule::new("persona", move |v| {
                (lang_matches(&v.lang, &persona_locale)
                    || lang_in_family(&v.lang, &persona_family))
                    && signals_persona(v)
            }))
            .rule(VoiceRule::new("locale", move |v| {
                lang_matches(&v.lang, &any_locale)
            }))
            .rule(VoiceRule::new("default", |v| v.is_default))
    }

    /// Pick a voice, returning the winning rule's name alongside it
    #[must_use]
    pub fn select<'a>(&self, voices: &'a [Voice]) -> Option<(&'static str, &'a Voice)> {
        self.rules.iter().find_map(|rule| {
            voices
                .iter()
                .find(|v| rule.matches(v))
                .map(|v| (rule.name, v))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().replace('_', "-").to_ascii_lowercase()
}

fn primary_subtag(tag: &str) -> String {
    normalize_tag(tag)
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Whether a voice language serves a locale
///
/// Exact match (case- and separator-insensitive), or a bare language voice
/// ("id") for a regional locale ("id-ID").
#[must_use]
pub fn lang_matches(voice_lang: &str, locale: &str) -> bool {
    let voice = normalize_tag(voice_lang);
    let locale = normalize_tag(locale);
    !voice.is_empty() && (voice == locale || voice == primary_subtag(&locale))
}

/// Whether a voice language belongs to a language family ("en-US" is in "en")
#[must_use]
pub fn lang_in_family(voice_lang: &str, family: &str) -> bool {
    let family = primary_subtag(family);
    !family.is_empty() && primary_subtag(voice_lang) == family
}

/// Whether a voice signals a masculine or young persona
///
/// Name matching is whole-word so "female" does not count as "male".
#[must_use]
pub fn signals_persona(voice: &Voice) -> bool {
    if voice.gender == Some(Gender::Male) {
        return true;
    }

    voice
        .name
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case("male") || word.eq_ignore_ascii_case("young"))
}
