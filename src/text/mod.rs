//! Text module - question normalization
//!
//! Both matching stages compare normalized text:
//! lowercase → tokenize → keep purely alphanumeric, non-stop-word tokens → join with spaces.
//!
//! ## Usage
//! ```rust,ignore
//! let normalizer = TextNormalizer::spanish();
//! assert_eq!(normalizer.normalize("¿Cuál es su horario?"), "cuál horario");
//! ```

mod stopwords;

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

pub use stopwords::SPANISH_STOP_WORDS;

/// Word tokenizer
///
/// Order matters: numbers keep their internal separators (`1.5`, `10,000`) and
/// hyphenated/apostrophe words stay whole (`e-mail`), so both are later dropped
/// by the alphanumeric filter instead of leaking fragments. Any other
/// non-space character (`¿`, `¡`, `?`, `,` ...) becomes its own token.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+(?:[.,]\d+)+|\w+(?:['’\-]\w+)*|[^\w\s]")
        .unwrap_or_else(|e| unreachable!("invalid token regex: {}", e))
});

// ============================================================================
// TextNormalizer
// ============================================================================

/// Question normalizer
///
/// Pure and deterministic for a fixed stop-word set.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    stop_words: HashSet<String>,
}

impl TextNormalizer {
    /// Spanish normalizer (default target language)
    pub fn spanish() -> Self {
        Self::with_stop_words(SPANISH_STOP_WORDS.iter().copied())
    }

    /// Normalizer with a custom stop-word set
    ///
    /// Stop words are lowercased on the way in.
    pub fn with_stop_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stop_words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { stop_words }
    }

    /// Add extra stop words (e.g. store name, greetings)
    pub fn extend_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stop_words.extend(
            words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty()),
        );
        self
    }

    /// Is `word` (already lowercase) a stop word?
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    /// Normalized token list
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        tokenize(&lowered)
            .filter(|t| is_alphanumeric_token(t))
            .filter(|t| !self.is_stop_word(t))
            .map(str::to_string)
            .collect()
    }

    /// Normalize text into the canonical space-separated form
    ///
    /// An empty result means "no usable content".
    pub fn normalize(&self, text: &str) -> String {
        self.tokens(text).join(" ")
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::spanish()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Split into word units (input should already be lowercase)
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    TOKEN_RE.find_iter(text).map(|m| m.as_str())
}

fn is_alphanumeric_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_alphanumeric)
}

// ============================================================================
// Tests
// ============================================================================
