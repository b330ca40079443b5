//! Comment cleanup applied before any model sees the text.

use crate::config::{SanitizerConfig, Substitution};
use crate::error::AppError;

/// Code points stripped from every comment: emoticons, pictographs,
/// transport and map symbols, flags, dingbats, enclosed characters and a few
/// joiners and selectors. Intervals are inclusive and may overlap.
const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x1F600, 0x1F64F),
    (0x1F300, 0x1F5FF),
    (0x1F680, 0x1F6FF),
    (0x1F1E0, 0x1F1FF),
    (0x2500, 0x2BEF),
    (0x2702, 0x27B0),
    (0x24C2, 0x1F251),
    (0x1F926, 0x1F937),
    (0x10000, 0x10FFFF),
    (0x2640, 0x2642),
    (0x2600, 0x2B55),
    (0x200D, 0x200D),
    (0x23CF, 0x23CF),
    (0x23E9, 0x23E9),
    (0x231A, 0x231A),
    (0xFE0F, 0xFE0F),
    (0x3030, 0x3030),
];

pub fn is_emoji(c: char) -> bool {
    let cp = c as u32;
    EMOJI_RANGES
        .iter()
        .any(|&(start, end)| cp >= start && cp <= end)
}

pub fn strip_emoji(text: &str) -> String {
    text.chars().filter(|c| !is_emoji(*c)).collect()
}

#[derive(Debug, Clone)]
pub struct Sanitizer {
    substitutions: Vec<Substitution>,
    decorative: Vec<char>,
}

impl Sanitizer {
    /// Build a sanitizer from configuration.
    ///
    /// Rejects tables that would make sanitizing non-idempotent or could grow
    /// the text: an alias not shorter than its phrase, an alias carrying a
    /// decorative character or emoji, or an alias that contains a phrase.
    pub fn new(config: &SanitizerConfig) -> Result<Self, AppError> {
        for sub in &config.substitutions {
            if sub.from.is_empty() {
                return Err(AppError::Config("substitution with empty phrase".to_string()));
            }
            if sub.to.len() >= sub.from.len() || sub.to.chars().count() > sub.from.chars().count() {
                return Err(AppError::Config(format!(
                    "alias '{}' is not shorter than '{}'",
                    sub.to, sub.from
                )));
            }
            if sub
                .to
                .chars()
                .any(|c| config.decorative.contains(&c) || is_emoji(c))
            {
                return Err(AppError::Config(format!(
                    "alias '{}' contains a character that is stripped",
                    sub.to
                )));
            }
            if let Some(other) = config
                .substitutions
                .iter()
                .find(|other| sub.to.contains(other.from.as_str()))
            {
                return Err(AppError::Config(format!(
                    "alias '{}' contains the phrase '{}'",
                    sub.to, other.from
                )));
            }
        }

        Ok(Self {
            substitutions: config.substitutions.clone(),
            decorative: config.decorative.clone(),
        })
    }

    /// Strip emoji, rewrite organization names to their aliases, then drop
    /// decorative characters. Aliases must be substituted before the
    /// decorative pass because phrases such as "Transporte + Recorridos"
    /// contain one.
    ///
    /// Substitution is repeated until no phrase is left, and once more after
    /// stripping, so the output is a fixed point of `sanitize`.
    pub fn sanitize(&self, raw: &str) -> String {
        let mut text = strip_emoji(raw);
        self.substitute(&mut text);
        let before = text.len();
        text.retain(|c| !self.decorative.contains(&c));
        if text.len() != before {
            self.substitute(&mut text);
        }
        text
    }

    fn substitute(&self, text: &mut String) {
        // Every alias is strictly shorter than its phrase, so this terminates.
        loop {
            let mut changed = false;
            for sub in &self.substitutions {
                if text.contains(sub.from.as_str()) {
                    *text = text.replace(sub.from.as_str(), &sub.to);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        let config = SanitizerConfig::default();
        Self {
            substitutions: config.substitutions,
            decorative: config.decorative,
        }
    }
}
