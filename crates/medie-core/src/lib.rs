//! medie Core - Domain models, errors, and shared types
//!
//! This crate defines the core abstractions used throughout medie:
//! - Entity label and relation type vocabularies
//! - Entity, relation and document records
//! - Common error types
//! - Configuration management
//! - Character-offset helpers for span arithmetic

pub mod config;
pub mod span;

pub use config::{
    AppConfig, ConfigError, Device, ExtractionConfig, LoggingConfig, NerConfig, NerMethod,
    PreprocessConfig,
};
pub use span::CharText;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for medie operations
#[derive(Error, Debug)]
pub enum MedieError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid relation rule: {0}")]
    InvalidRule(String),

    #[error("Unknown entity label: {0}")]
    UnknownLabel(String),

    #[error("Unknown relation type: {0}")]
    UnknownRelationType(String),

    #[error("Entity source error: {0}")]
    EntitySource(String),

    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for MedieError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MedieError>;

// ============================================================================
// Vocabularies
// ============================================================================

/// Entity categories produced by the entity sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLabel {
    Age,
    Date,
    Gender,
    Job,
    Location,
    Name,
    Organization,
    PatientId,
    SymptomAndDisease,
    Transportation,
}

impl EntityLabel {
    /// Every label, in alphabetical order
    pub const ALL: [EntityLabel; 10] = [
        Self::Age,
        Self::Date,
        Self::Gender,
        Self::Job,
        Self::Location,
        Self::Name,
        Self::Organization,
        Self::PatientId,
        Self::SymptomAndDisease,
        Self::Transportation,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Age => "AGE",
            Self::Date => "DATE",
            Self::Gender => "GENDER",
            Self::Job => "JOB",
            Self::Location => "LOCATION",
            Self::Name => "NAME",
            Self::Organization => "ORGANIZATION",
            Self::PatientId => "PATIENT_ID",
            Self::SymptomAndDisease => "SYMPTOM_AND_DISEASE",
            Self::Transportation => "TRANSPORTATION",
        }
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityLabel {
    type Err = MedieError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == wanted)
            .ok_or_else(|| MedieError::UnknownLabel(s.to_string()))
    }
}

/// Relation types emitted by the relation extraction engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// Person -> place of residence
    LivedAt,
    /// Person -> symptom or disease
    HasSymptom,
    /// Person -> visited place
    Visited,
}

impl RelationType {
    pub const ALL: [RelationType; 3] = [Self::LivedAt, Self::HasSymptom, Self::Visited];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LivedAt => "LIVED_AT",
            Self::HasSymptom => "HAS_SYMPTOM",
            Self::Visited => "VISITED",
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RelationType {
    type Err = MedieError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|rel| rel.as_str() == wanted)
            .ok_or_else(|| MedieError::UnknownRelationType(s.to_string()))
    }
}

// ============================================================================
// Extraction Records
// ============================================================================

/// A labeled character span recognized in normalized text
///
/// `start_char`/`end_char` are half-open offsets counted in Unicode scalar
/// values, not bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Identifier, unique within one document
    pub id: String,

    /// Surface form
    pub text: String,

    pub label: EntityLabel,

    pub start_char: usize,

    pub end_char: usize,

    /// Recognizer score (0.0 - 1.0), if the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Entity {
    /// Create a new entity without a confidence score
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        label: EntityLabel,
        start_char: usize,
        end_char: usize,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            label,
            start_char,
            end_char,
            confidence: None,
        }
    }

    /// Set confidence score
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Span length in characters (zero for degraded spans)
    pub fn len_chars(&self) -> usize {
        self.end_char.saturating_sub(self.start_char)
    }
}

/// A directed, typed link between two entities of the same document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub source_id: String,
    pub target_id: String,
    pub relation_type: RelationType,

    /// Trigger keyword found between the two entities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Relation {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type,
            evidence: None,
        }
    }

    /// Set the evidence phrase
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// Subject/predicate/object view of a relation using surface texts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

// ============================================================================
// Document
// ============================================================================

/// Result of one extraction run over a narrative
///
/// Built once by the pipeline and read-only afterward; fields are only
/// reachable through accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: Uuid,
    original_text: String,
    normalized_text: String,
    tokens: Vec<String>,
    entities: Vec<Entity>,
    relations: Vec<Relation>,
    processed_at: DateTime<Utc>,
}

impl Document {
    /// Assemble a document from the outputs of each pipeline stage
    pub fn new(
        original_text: impl Into<String>,
        normalized_text: impl Into<String>,
        tokens: Vec<String>,
        entities: Vec<Entity>,
        relations: Vec<Relation>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_text: original_text.into(),
            normalized_text: normalized_text.into(),
            tokens,
            entities,
            relations,
            processed_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn normalized_text(&self) -> &str {
        &self.normalized_text
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Entities in discovery order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Relations in extraction order
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }

    /// Look up an entity by id
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Check that every relation links two distinct entities of this document
    pub fn validate(&self) -> Result<()> {
        let ids: HashSet<&str> = self.entities.iter().map(|e| e.id.as_str()).collect();

        for rel in &self.relations {
            if rel.source_id == rel.target_id {
                return Err(MedieError::DataIntegrity(format!(
                    "{} relation links entity {} to itself",
                    rel.relation_type, rel.source_id
                )));
            }
            for id in [&rel.source_id, &rel.target_id] {
                if !ids.contains(id.as_str()) {
                    return Err(MedieError::DataIntegrity(format!(
                        "{} relation references unknown entity {}",
                        rel.relation_type, id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Relations expressed as surface-text triples
    ///
    /// Ids that do not resolve fall back to the raw id.
    pub fn triples(&self) -> Vec<KnowledgeTriple> {
        let text_of = |id: &str| {
            self.entity(id)
                .map(|e| e.text.clone())
                .unwrap_or_else(|| id.to_string())
        };

        self.relations
            .iter()
            .map(|rel| KnowledgeTriple {
                subject: text_of(&rel.source_id),
                predicate: rel.relation_type.to_string(),
                object: text_of(&rel.target_id),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
