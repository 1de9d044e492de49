//! medie Preprocess - Text cleaning and tokenization
//!
//! Narratives arrive as loosely formatted text (copied from web pages,
//! reports, chat logs). This crate turns them into the canonical form every
//! later stage indexes into:
//! - markup tags and zero-width spaces removed
//! - Unicode NFC composition (Vietnamese diacritics as single code points)
//! - surrounding whitespace trimmed
//!
//! Tokenization delegates to a pluggable [`Segmenter`] and degrades to a
//! whitespace split when the segmenter fails.

pub mod segmenter;

pub use segmenter::CompoundSegmenter;

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// Error Types
// ============================================================================

/// Errors reported by segmentation strategies
#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Segmentation failed: {0}")]
    Failed(String),
}

// ============================================================================
// Normalization
// ============================================================================

const ZERO_WIDTH_SPACE: char = '\u{200B}';

fn markup_pattern() -> &'static Regex {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    MARKUP.get_or_init(|| Regex::new(r"<[^>]+>").expect("markup pattern is valid"))
}

/// Canonicalize raw narrative text
///
/// Strips `<...>` tags, drops zero-width spaces, applies NFC and trims.
pub fn normalize(text: &str) -> String {
    let stripped = markup_pattern().replace_all(text, "");
    let composed: String = stripped
        .chars()
        .filter(|c| *c != ZERO_WIDTH_SPACE)
        .nfc()
        .collect();
    composed.trim().to_string()
}

// ============================================================================
// Tokenization
// ============================================================================

/// Word segmentation strategy
pub trait Segmenter: Send + Sync {
    /// Split text into tokens
    fn segment(&self, text: &str) -> Result<Vec<String>, SegmentError>;

    /// Strategy name for logging
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> Segmenter for F
where
    F: Fn(&str) -> Result<Vec<String>, SegmentError> + Send + Sync,
{
    fn segment(&self, text: &str) -> Result<Vec<String>, SegmentError> {
        self(text)
    }
}

/// Naive whitespace split
pub fn whitespace_tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Tokenize with an optional segmenter, falling back to whitespace split
pub fn tokenize(text: &str, segmenter: Option<&dyn Segmenter>) -> Vec<String> {
    let Some(segmenter) = segmenter else {
        return whitespace_tokens(text);
    };

    match segmenter.segment(text) {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(
                segmenter = segmenter.name(),
                error = %e,
                "Segmentation failed, falling back to whitespace split"
            );
            whitespace_tokens(text)
        }
    }
}

// ============================================================================
// Preprocessor
// ============================================================================

/// Normalizer + tokenizer pair used by the pipeline
#[derive(Default)]
pub struct TextPreprocessor {
    segmenter: Option<Box<dyn Segmenter>>,
}

impl TextPreprocessor {
    /// Create a preprocessor that tokenizes on whitespace only
    pub fn new() -> Self {
        Self { segmenter: None }
    }

    /// Use a segmentation strategy for tokenization
    pub fn with_segmenter(mut self, segmenter: impl Segmenter + 'static) -> Self {
        self.segmenter = Some(Box::new(segmenter));
        self
    }

    pub fn has_segmenter(&self) -> bool {
        self.segmenter.is_some()
    }

    pub fn clean_text(&self, text: &str) -> String {
        normalize(text)
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        tokenize(text, self.segmenter.as_deref())
    }
}

impl std::fmt::Debug for TextPreprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPreprocessor")
            .field("segmenter", &self.segmenter.as_ref().map(|s| s.name()))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_markup_and_zero_width() {
        let raw = "  <p>Bệnh\u{200B} nhân <b>sốt</b></p>\n";
        assert_eq!(normalize(raw), "Bệnh nhân sốt");
    }

    #[test]
    fn test_normalize_composes_decomposed_vietnamese() {
        // "ố" written as o + circumflex + acute
        let decomposed = "s\u{006F}\u{0302}\u{0301}t";
        let normalized = normalize(decomposed);
        assert_eq!(normalized, "sốt");
        assert_eq!(normalized.chars().count(), 3);
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  <br/>  "), "");
    }

    #[test]
    fn test_tokenize_without_segmenter() {
        assert_eq!(
            tokenize("ho  khan\tvà sốt", None),
            vec!["ho", "khan", "và", "sốt"]
        );
        assert!(tokenize("", None).is_empty());
    }

    #[test]
    fn test_tokenize_falls_back_when_segmenter_fails() {
        let failing = |_: &str| -> Result<Vec<String>, SegmentError> {
            Err(SegmentError::Failed("model not loaded".to_string()))
        };
        let pre = TextPreprocessor::new().with_segmenter(failing);
        assert_eq!(pre.tokenize("đau họng"), vec!["đau", "họng"]);
    }

    #[test]
    fn test_tokenize_uses_segmenter_output() {
        let joined = |text: &str| -> Result<Vec<String>, SegmentError> {
            Ok(vec![text.replace(' ', "_")])
        };
        let pre = TextPreprocessor::new().with_segmenter(joined);
        assert!(pre.has_segmenter());
        assert_eq!(pre.tokenize("đau họng"), vec!["đau_họng"]);
    }
}
