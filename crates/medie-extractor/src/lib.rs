//! medie Extractor - Knowledge extraction pipeline
//!
//! Implements Named Entity Recognition (NER) strategies, rule-based
//! Relation Extraction (RE) and the end-to-end pipeline that turns a
//! narrative into a [`Document`](medie_core::Document).

use medie_core::{Entity, Relation, Result};

/// Trait for entity recognition strategies
pub trait EntitySource: Send + Sync {
    /// Recognize entities in normalized text
    ///
    /// `tokens` is the tokenizer output for the same text, when available.
    fn predict(&self, text: &str, tokens: Option<&[String]>) -> Result<Vec<Entity>>;

    /// Strategy name for logging
    fn name(&self) -> &str;
}

/// Trait for relation extractors
pub trait RelationExtractor: Send + Sync {
    fn extract(&self, text: &str, entities: &[Entity]) -> Result<Vec<Relation>>;
}

pub mod lexicon;
pub mod metrics;
pub mod ner;
pub mod pipeline;
pub mod relation;

pub use lexicon::LexiconModel;
pub use ner::{PrecomputedEntities, SequenceTaggerNer, SpanLabelerNer};
pub use pipeline::Pipeline;
pub use relation::{RelationRule, RuleBasedRe};
