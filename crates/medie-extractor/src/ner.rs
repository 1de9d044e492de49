//! Named Entity Recognition (NER) module
//!
//! Provides two interchangeable recognition strategies behind
//! [`EntitySource`]:
//! - Span labeling (`gliner`): a model returns labeled spans with offsets
//! - Sequence tagging (`standard`): a model returns per-token BIO tags which
//!   are aggregated into entity groups, with offsets recovered by text search
//!   when the model cannot report them
//!
//! Model backends plug in through [`SpanModel`] and [`TokenClassifier`].

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::lexicon::LexiconModel;
use crate::EntitySource;
use medie_core::span::char_len;
use medie_core::{CharText, Device, Entity, EntityLabel, MedieError, NerConfig, NerMethod, Result};

// ============================================================================
// Backend contracts
// ============================================================================

/// Labeled span reported by a span-labeling model (character offsets)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanPrediction {
    pub text: String,
    pub label: EntityLabel,
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

/// Span-labeling model backend
pub trait SpanModel: Send + Sync {
    /// Predict spans restricted to `labels`
    fn predict_spans(&self, text: &str, labels: &[EntityLabel]) -> Result<Vec<SpanPrediction>>;
}

/// Token reported by a token-classification model
///
/// Offsets are character positions in the classifier input; tokenizers that
/// cannot map tokens back to the input leave them empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTag {
    pub word: String,
    /// BIO tag, e.g. `B-LOCATION`, `I-LOCATION`, `O`
    pub tag: String,
    pub score: f32,
    pub start: Option<usize>,
    pub end: Option<usize>,
}

/// Token-classification model backend
pub trait TokenClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Vec<TokenTag>>;
}

// ============================================================================
// BIO tagging
// ============================================================================

/// Parsed BIO tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BioTag {
    Outside,
    Begin(EntityLabel),
    Inside(EntityLabel),
}

impl BioTag {
    /// Parse `O`, `B-LABEL` or `I-LABEL`
    pub fn parse(tag: &str) -> Option<Self> {
        if tag == "O" {
            return Some(Self::Outside);
        }
        let (prefix, label) = tag.split_once('-')?;
        let label = label.parse().ok()?;
        match prefix {
            "B" => Some(Self::Begin(label)),
            "I" => Some(Self::Inside(label)),
            _ => None,
        }
    }
}

/// Full tag vocabulary of the sequence tagger: `O`, then `B-`/`I-` per label
pub fn bio_labels() -> Vec<String> {
    let mut labels = vec!["O".to_string()];
    for label in EntityLabel::ALL {
        labels.push(format!("B-{label}"));
        labels.push(format!("I-{label}"));
    }
    labels
}

/// Entity group produced by aggregating BIO tokens
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedGroup {
    pub label: EntityLabel,
    pub word: String,
    /// Mean token score
    pub score: f32,
    pub start: Option<usize>,
    pub end: Option<usize>,
}

struct GroupBuilder {
    label: EntityLabel,
    words: Vec<String>,
    score_sum: f32,
    count: usize,
    start: Option<usize>,
    end: Option<usize>,
    offsets_known: bool,
}

impl GroupBuilder {
    fn open(label: EntityLabel, token: &TokenTag) -> Self {
        Self {
            label,
            words: vec![token.word.clone()],
            score_sum: token.score,
            count: 1,
            start: token.start,
            end: token.end,
            offsets_known: token.start.is_some() && token.end.is_some(),
        }
    }

    fn push(&mut self, token: &TokenTag) {
        self.words.push(token.word.clone());
        self.score_sum += token.score;
        self.count += 1;
        self.end = token.end;
        self.offsets_known &= token.start.is_some() && token.end.is_some();
    }

    fn finish(self, input: &CharText<'_>) -> TaggedGroup {
        let score = self.score_sum / self.count as f32;
        match (self.offsets_known, self.start, self.end) {
            (true, Some(start), Some(end)) if start < end => TaggedGroup {
                label: self.label,
                word: input.slice(start, end).to_string(),
                score,
                start: Some(start),
                end: Some(end),
            },
            _ => TaggedGroup {
                label: self.label,
                word: self.words.join(" "),
                score,
                start: None,
                end: None,
            },
        }
    }
}

/// Group consecutive BIO tokens into entities ("simple" aggregation)
///
/// `B-X` or an `I-X` that does not continue an open `X` group starts a new
/// group; `O` closes the open group. Unknown tags count as `O`.
pub fn aggregate_simple(input: &str, tags: &[TokenTag]) -> Vec<TaggedGroup> {
    let input = CharText::new(input);
    let mut groups = Vec::new();
    let mut current: Option<GroupBuilder> = None;

    for token in tags {
        let bio = BioTag::parse(&token.tag).unwrap_or_else(|| {
            warn!(tag = %token.tag, "Unknown BIO tag, treating as O");
            BioTag::Outside
        });

        match bio {
            BioTag::Outside => {
                if let Some(group) = current.take() {
                    groups.push(group.finish(&input));
                }
            }
            BioTag::Inside(label) if current.as_ref().is_some_and(|g| g.label == label) => {
                if let Some(group) = current.as_mut() {
                    group.push(token);
                }
            }
            BioTag::Begin(label) | BioTag::Inside(label) => {
                if let Some(group) = current.take() {
                    groups.push(group.finish(&input));
                }
                current = Some(GroupBuilder::open(label, token));
            }
        }
    }

    if let Some(group) = current {
        groups.push(group.finish(&input));
    }
    groups
}

// ============================================================================
// Offset recovery
// ============================================================================

/// Best-effort span lookup for predictions without usable offsets
///
/// Searches forward from the end of the previous hit so repeated surface
/// forms map to successive occurrences.
pub struct OffsetResolver<'a> {
    text: CharText<'a>,
    cursor: usize,
}

impl<'a> OffsetResolver<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text: CharText::new(text),
            cursor: 0,
        }
    }

    /// Locate `word`, trying it verbatim and then with `_` read as spaces
    ///
    /// Returns `(0, 0)` when neither form occurs after the cursor.
    pub fn locate(&mut self, word: &str) -> (usize, usize) {
        let spaced = word.trim().replace('_', " ");

        for needle in [word, spaced.as_str()] {
            if needle.is_empty() {
                continue;
            }
            if let Some(found) = self.text.find(needle, self.cursor) {
                let end = found + char_len(needle);
                self.cursor = end;
                return (found, end);
            }
        }

        warn!(word, "Entity not found in text, using an empty span at 0");
        (0, 0)
    }

    pub fn text(&self) -> &CharText<'a> {
        &self.text
    }
}

// ============================================================================
// Span-labeling strategy
// ============================================================================

/// Labels requested from span-labeling models, in prompt order
pub const SPAN_LABELS: [EntityLabel; 10] = [
    EntityLabel::SymptomAndDisease,
    EntityLabel::PatientId,
    EntityLabel::Name,
    EntityLabel::Age,
    EntityLabel::Gender,
    EntityLabel::Job,
    EntityLabel::Location,
    EntityLabel::Organization,
    EntityLabel::Transportation,
    EntityLabel::Date,
];

/// General-purpose span labeler (`gliner` method)
pub struct SpanLabelerNer {
    model: Box<dyn SpanModel>,
    model_path: String,
    device: Device,
    labels: Vec<EntityLabel>,
}

impl SpanLabelerNer {
    pub fn new(model: impl SpanModel + 'static) -> Self {
        Self {
            model: Box::new(model),
            model_path: NerMethod::Gliner.default_model_path().to_string(),
            device: Device::Cpu,
            labels: SPAN_LABELS.to_vec(),
        }
    }

    /// Record which model and device back this strategy
    pub fn with_model_info(mut self, model_path: impl Into<String>, device: Device) -> Self {
        self.model_path = model_path.into();
        self.device = device;
        self
    }

    /// Restrict the labels requested from the model
    pub fn with_labels(mut self, labels: Vec<EntityLabel>) -> Self {
        self.labels = labels;
        self
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl EntitySource for SpanLabelerNer {
    fn predict(&self, text: &str, _tokens: Option<&[String]>) -> Result<Vec<Entity>> {
        let spans = self.model.predict_spans(text, &self.labels)?;

        let entities: Vec<Entity> = spans
            .into_iter()
            .enumerate()
            .map(|(idx, span)| {
                Entity::new(
                    format!("gli_{idx}"),
                    span.text,
                    span.label,
                    span.start,
                    span.end,
                )
                .with_confidence(span.score)
            })
            .collect();

        debug!(count = entities.len(), "Span labeler predicted entities");
        Ok(entities)
    }

    fn name(&self) -> &str {
        NerMethod::Gliner.as_str()
    }
}

// ============================================================================
// Sequence-tagging strategy
// ============================================================================

/// Fine-tuned BIO sequence tagger (`standard` method)
pub struct SequenceTaggerNer {
    classifier: Box<dyn TokenClassifier>,
    model_path: String,
    device: Device,
}

impl SequenceTaggerNer {
    pub fn new(classifier: impl TokenClassifier + 'static) -> Self {
        Self {
            classifier: Box::new(classifier),
            model_path: NerMethod::Standard.default_model_path().to_string(),
            device: Device::Cpu,
        }
    }

    /// Record which model and device back this strategy
    pub fn with_model_info(mut self, model_path: impl Into<String>, device: Device) -> Self {
        self.model_path = model_path.into();
        self.device = device;
        self
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl EntitySource for SequenceTaggerNer {
    fn predict(&self, text: &str, tokens: Option<&[String]>) -> Result<Vec<Entity>> {
        // Word-segmented models read the token sequence, not the raw text
        let input = match tokens {
            Some(tokens) if !tokens.is_empty() => tokens.join(" "),
            _ => text.to_string(),
        };

        let tags = self.classifier.classify(&input)?;
        let groups = aggregate_simple(&input, &tags);

        // Classifier offsets index `input`; only reuse them when it is `text`
        let offsets_usable = input == text;
        let mut resolver = OffsetResolver::new(text);

        let entities: Vec<Entity> = groups
            .into_iter()
            .enumerate()
            .map(|(idx, group)| {
                let (start, end) = match (offsets_usable, group.start, group.end) {
                    (true, Some(start), Some(end)) => (start, end),
                    _ => resolver.locate(&group.word),
                };
                let surface = match resolver.text().slice(start, end) {
                    "" => group.word,
                    found => found.to_string(),
                };
                Entity::new(format!("ent_{idx}"), surface, group.label, start, end)
                    .with_confidence(group.score)
            })
            .collect();

        debug!(
            count = entities.len(),
            tokens = tags.len(),
            "Sequence tagger predicted entities"
        );
        Ok(entities)
    }

    fn name(&self) -> &str {
        NerMethod::Standard.as_str()
    }
}

// ============================================================================
// Precomputed entities
// ============================================================================

/// Entities produced elsewhere (e.g. an offline model run), loaded from JSON
pub struct PrecomputedEntities {
    entities: Vec<Entity>,
}

impl PrecomputedEntities {
    /// Parse a JSON array of entities; ids must be unique
    pub fn from_json(json: &str) -> Result<Self> {
        let entities: Vec<Entity> = serde_json::from_str(json)
            .map_err(|e| MedieError::EntitySource(format!("invalid entity JSON: {e}")))?;

        let mut seen = HashSet::new();
        for entity in &entities {
            if !seen.insert(entity.id.as_str()) {
                return Err(MedieError::EntitySource(format!(
                    "duplicate entity id {}",
                    entity.id
                )));
            }
        }

        Ok(Self { entities })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntitySource for PrecomputedEntities {
    /// Return the loaded entities with spans clamped to the text
    fn predict(&self, text: &str, _tokens: Option<&[String]>) -> Result<Vec<Entity>> {
        let len = char_len(text);

        Ok(self
            .entities
            .iter()
            .map(|entity| {
                let mut entity = entity.clone();
                let end = entity.end_char.min(len);
                let start = entity.start_char.min(end);
                if (start, end) != (entity.start_char, entity.end_char) {
                    warn!(
                        id = %entity.id,
                        start = entity.start_char,
                        end = entity.end_char,
                        len,
                        "Entity span outside text, clamping"
                    );
                    entity.start_char = start;
                    entity.end_char = end;
                }
                entity
            })
            .collect())
    }

    fn name(&self) -> &str {
        "precomputed"
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Build the entity source selected by configuration
///
/// Both strategies run on the built-in lexicon backend; the configured model
/// path and device identify the strategy in logs and output.
pub fn entity_source_for(config: &NerConfig) -> Box<dyn EntitySource> {
    let model_path = config.effective_model_path();
    info!(
        method = %config.method,
        model = model_path,
        device = %config.device,
        "Initializing entity source"
    );

    match config.method {
        NerMethod::Gliner => Box::new(
            SpanLabelerNer::new(LexiconModel::new()).with_model_info(model_path, config.device),
        ),
        NerMethod::Standard => Box::new(
            SequenceTaggerNer::new(LexiconModel::new()).with_model_info(model_path, config.device),
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================
