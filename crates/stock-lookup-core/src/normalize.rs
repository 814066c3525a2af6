//! Text normalization for fuzzy product-name matching.
//!
//! [`Normalizer::normalize`] turns free text into an ordered sequence of
//! base-form tokens:
//!
//! 1. Drop every character that is not alphanumeric, `_`, or whitespace.
//! 2. Lowercase and split on whitespace.
//! 3. Drop tokens shorter than `min_token_length` characters.
//! 4. Reduce each surviving token with the configured [`Lemmatizer`].
//!
//! Order and duplicates are preserved. The name pass of the search engine
//! works on the space-joined form returned by [`Normalizer::normalized_name`].

use std::fmt;
use std::sync::Arc;

use rust_stemmers::{Algorithm, Stemmer};

use crate::error::UnknownLanguage;

/// Default minimum token length, in characters.
pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 3;

/// Reduces a single lowercase token to its canonical base form.
///
/// Implementations must be pure: the same token always yields the same
/// base form. Lemmatizers, stemmers and the identity function all qualify.
pub trait Lemmatizer: Send + Sync {
    /// Returns the base form of `token`.
    fn base_form(&self, token: &str) -> String;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}

/// Leaves every token unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityLemmatizer;

impl Lemmatizer for IdentityLemmatizer {
    fn base_form(&self, token: &str) -> String {
        token.to_string()
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Snowball stemmer for one language.
pub struct SnowballLemmatizer {
    language: &'static str,
    stemmer: Stemmer,
}

impl SnowballLemmatizer {
    pub fn new(language: &str) -> Result<Self, UnknownLanguage> {
        let (language, algorithm) = snowball_algorithm(language)?;
        Ok(Self {
            language,
            stemmer: Stemmer::create(algorithm),
        })
    }

    pub fn russian() -> Self {
        Self {
            language: "russian",
            stemmer: Stemmer::create(Algorithm::Russian),
        }
    }
}

impl Lemmatizer for SnowballLemmatizer {
    fn base_form(&self, token: &str) -> String {
        self.stemmer.stem(token).into_owned()
    }

    fn name(&self) -> &str {
        self.language
    }
}

impl fmt::Debug for SnowballLemmatizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowballLemmatizer")
            .field("language", &self.language)
            .finish()
    }
}

fn snowball_algorithm(language: &str) -> Result<(&'static str, Algorithm), UnknownLanguage> {
    let found = match language.trim().to_lowercase().as_str() {
        "arabic" => ("arabic", Algorithm::Arabic),
        "danish" => ("danish", Algorithm::Danish),
        "dutch" => ("dutch", Algorithm::Dutch),
        "english" => ("english", Algorithm::English),
        "finnish" => ("finnish", Algorithm::Finnish),
        "french" => ("french", Algorithm::French),
        "german" => ("german", Algorithm::German),
        "greek" => ("greek", Algorithm::Greek),
        "hungarian" => ("hungarian", Algorithm::Hungarian),
        "italian" => ("italian", Algorithm::Italian),
        "norwegian" => ("norwegian", Algorithm::Norwegian),
        "portuguese" => ("portuguese", Algorithm::Portuguese),
        "romanian" => ("romanian", Algorithm::Romanian),
        "russian" => ("russian", Algorithm::Russian),
        "spanish" => ("spanish", Algorithm::Spanish),
        "swedish" => ("swedish", Algorithm::Swedish),
        "tamil" => ("tamil", Algorithm::Tamil),
        "turkish" => ("turkish", Algorithm::Turkish),
        _ => return Err(UnknownLanguage(language.to_string())),
    };
    Ok(found)
}

/// Builds the lemmatizer for a configured language name.
///
/// `"none"` (or `"identity"`) selects [`IdentityLemmatizer`]; anything else
/// must name a Snowball language.
pub fn lemmatizer_for(language: &str) -> Result<Arc<dyn Lemmatizer>, UnknownLanguage> {
    match language.trim().to_lowercase().as_str() {
        "none" | "identity" => Ok(Arc::new(IdentityLemmatizer)),
        _ => Ok(Arc::new(SnowballLemmatizer::new(language)?)),
    }
}

/// Deterministic text → token pipeline shared by ingestion and search.
#[derive(Clone)]
pub struct Normalizer {
    min_token_length: usize,
    lemmatizer: Arc<dyn Lemmatizer>,
}

impl Normalizer {
    pub fn new(min_token_length: usize, lemmatizer: Arc<dyn Lemmatizer>) -> Self {
        Self {
            min_token_length,
            lemmatizer,
        }
    }

    /// Builds a normalizer from plain configuration values.
    pub fn from_options(min_token_length: usize, language: &str) -> Result<Self, UnknownLanguage> {
        Ok(Self::new(min_token_length, lemmatizer_for(language)?))
    }

    pub fn min_token_length(&self) -> usize {
        self.min_token_length
    }

    pub fn lemmatizer_name(&self) -> &str {
        self.lemmatizer.name()
    }

    /// Normalizes `text` into its ordered base-form tokens.
    ///
    /// Empty or punctuation-only input yields an empty vector.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        // Lowercasing can add combining marks ('İ' → "i\u{307}"), so filter after it.
        let stripped: String = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
            .collect();

        stripped
            .split_whitespace()
            .filter(|word| word.chars().count() >= self.min_token_length)
            .map(|word| self.lemmatizer.base_form(word))
            .collect()
    }

    /// Normalized tokens joined by single spaces.
    pub fn normalized_name(&self, text: &str) -> String {
        self.normalize(text).join(" ")
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TOKEN_LENGTH, Arc::new(SnowballLemmatizer::russian()))
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("min_token_length", &self.min_token_length)
            .field("lemmatizer", &self.lemmatizer.name())
            .finish()
    }
}
