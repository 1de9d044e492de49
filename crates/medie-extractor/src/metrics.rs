//! Quality Metrics module
//!
//! Precision, recall and F1 for entity and relation extraction against a
//! gold-annotated set of narratives.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Pipeline;
use medie_core::{Document, Entity, EntityLabel, MedieError, RelationType, Result};

// ============================================================================
// Match Counts
// ============================================================================

/// True/false positive and false negative counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl MatchCounts {
    /// TP / (TP + FP), 0 when nothing was predicted
    pub fn precision(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// TP / (TP + FN), 0 when there is no gold
    pub fn recall(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// Harmonic mean of precision and recall
    pub fn f1_score(&self) -> f32 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn predicted_total(&self) -> usize {
        self.true_positives + self.false_positives
    }

    pub fn gold_total(&self) -> usize {
        self.true_positives + self.false_negatives
    }

    fn add(&mut self, other: &MatchCounts) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

// ============================================================================
// Gold Standard Types
// ============================================================================

/// Gold entity annotation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GoldEntity {
    pub text: String,
    pub label: EntityLabel,
    pub start_char: usize,
    pub end_char: usize,
}

impl From<&Entity> for GoldEntity {
    fn from(e: &Entity) -> Self {
        Self {
            text: e.text.clone(),
            label: e.label,
            start_char: e.start_char,
            end_char: e.end_char,
        }
    }
}

/// Gold relation annotation, by surface text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GoldRelation {
    pub source: String,
    pub relation_type: RelationType,
    pub target: String,
}

/// One annotated narrative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldSample {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<GoldEntity>,
    #[serde(default)]
    pub relations: Vec<GoldRelation>,
}

/// Load a JSON array of gold samples
pub fn load_gold(path: impl AsRef<Path>) -> Result<Vec<GoldSample>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    serde_json::from_str(&content)
        .map_err(|e| MedieError::Config(format!("invalid gold file: {e}")))
}

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluator for extraction quality
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    /// Require identical spans instead of identical text
    strict: bool,
}

impl Evaluator {
    /// Relaxed evaluator: entities match on label and text
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// Entities must match on label and exact character span
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    fn entities_match(&self, predicted: &GoldEntity, gold: &GoldEntity) -> bool {
        if predicted.label != gold.label {
            return false;
        }
        if self.strict {
            predicted.start_char == gold.start_char && predicted.end_char == gold.end_char
        } else {
            predicted.text == gold.text
        }
    }

    /// Greedy one-to-one matching of predicted against gold entities
    pub fn evaluate_entities(&self, predicted: &[Entity], gold: &[GoldEntity]) -> MatchCounts {
        let mut matched_gold: HashSet<usize> = HashSet::new();
        let mut true_positives = 0;

        for pred in predicted.iter().map(GoldEntity::from) {
            let hit = gold
                .iter()
                .enumerate()
                .find(|(idx, g)| !matched_gold.contains(idx) && self.entities_match(&pred, g));
            if let Some((idx, _)) = hit {
                matched_gold.insert(idx);
                true_positives += 1;
            }
        }

        MatchCounts {
            true_positives,
            false_positives: predicted.len() - true_positives,
            false_negatives: gold.len() - true_positives,
        }
    }

    /// Set comparison of (source text, type, target text) triples
    pub fn evaluate_relations(&self, document: &Document, gold: &[GoldRelation]) -> MatchCounts {
        let predicted: HashSet<GoldRelation> = document
            .relations()
            .iter()
            .map(|rel| GoldRelation {
                source: surface(document, &rel.source_id),
                relation_type: rel.relation_type,
                target: surface(document, &rel.target_id),
            })
            .collect();
        let gold: HashSet<&GoldRelation> = gold.iter().collect();

        let true_positives = predicted.iter().filter(|r| gold.contains(r)).count();

        MatchCounts {
            true_positives,
            false_positives: predicted.len() - true_positives,
            false_negatives: gold.len() - true_positives,
        }
    }

    /// Score one processed document against its annotation
    pub fn evaluate_document(&self, document: &Document, sample: &GoldSample) -> DocumentMetrics {
        DocumentMetrics {
            entities: self.evaluate_entities(document.entities(), &sample.entities),
            relations: self.evaluate_relations(document, &sample.relations),
        }
    }

    /// Run every sample through the pipeline and aggregate the scores
    pub fn evaluate_samples(
        &self,
        pipeline: &Pipeline,
        samples: &[GoldSample],
    ) -> Result<AggregateMetrics> {
        let mut aggregate = AggregateMetrics::default();

        for (idx, sample) in samples.iter().enumerate() {
            let document = pipeline.process(&sample.text)?;
            let metrics = self.evaluate_document(&document, sample);
            debug!(
                sample = idx,
                entity_f1 = metrics.entities.f1_score(),
                relation_f1 = metrics.relations.f1_score(),
                "Sample evaluated"
            );
            aggregate.add(&metrics);
        }

        info!(
            documents = aggregate.num_documents,
            entity_f1 = aggregate.entities.f1_score(),
            relation_f1 = aggregate.relations.f1_score(),
            "Evaluation finished"
        );
        Ok(aggregate)
    }
}

fn surface(document: &Document, id: &str) -> String {
    document
        .entity(id)
        .map(|e| e.text.clone())
        .unwrap_or_else(|| id.to_string())
}

// ============================================================================
// Aggregate Metrics
// ============================================================================

/// Scores for a single document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetrics {
    pub entities: MatchCounts,
    pub relations: MatchCounts,
}

/// Micro-averaged scores over a batch of documents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub entities: MatchCounts,
    pub relations: MatchCounts,
    pub num_documents: usize,
}

impl AggregateMetrics {
    pub fn add(&mut self, metrics: &DocumentMetrics) {
        self.entities.add(&metrics.entities);
        self.relations.add(&metrics.relations);
        self.num_documents += 1;
    }

    /// Human-readable summary
    pub fn report(&self) -> String {
        format!(
            "=== Extraction Quality Report ===\n\n\
             Documents evaluated: {}\n\n\
             Entity Extraction:\n{}\n\
             Relation Extraction:\n{}",
            self.num_documents,
            section(&self.entities),
            section(&self.relations),
        )
    }
}

fn section(counts: &MatchCounts) -> String {
    format!(
        "  Precision: {:.1}%\n  \
         Recall:    {:.1}%\n  \
         F1 Score:  {:.1}%\n  \
         Gold: {} | Predicted: {} | TP: {} | FP: {} | FN: {}\n",
        counts.precision() * 100.0,
        counts.recall() * 100.0,
        counts.f1_score() * 100.0,
        counts.gold_total(),
        counts.predicted_total(),
        counts.true_positives,
        counts.false_positives,
        counts.false_negatives,
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use medie_core::Relation;

    fn entity(id: &str, text: &str, label: EntityLabel, start: usize) -> Entity {
        Entity::new(id, text, label, start, start + text.chars().count())
    }

    fn gold_entity(text: &str, label: EntityLabel, start: usize) -> GoldEntity {
        GoldEntity {
            text: text.to_string(),
            label,
            start_char: start,
            end_char: start + text.chars().count(),
        }
    }

    #[test]
    fn test_counts_precision_recall_f1() {
        let counts = MatchCounts {
            true_positives: 8,
            false_positives: 2,
            false_negatives: 2,
        };
        assert!((counts.precision() - 0.8).abs() < 0.001);
        assert!((counts.recall() - 0.8).abs() < 0.001);
        assert!((counts.f1_score() - 0.8).abs() < 0.001);
        assert_eq!(counts.gold_total(), 10);
    }

    #[test]
    fn test_counts_empty_are_zero() {
        let counts = MatchCounts::default();
        assert_eq!(counts.precision(), 0.0);
        assert_eq!(counts.recall(), 0.0);
        assert_eq!(counts.f1_score(), 0.0);
    }

    #[test]
    fn test_evaluate_entities_relaxed_vs_strict() {
        let predicted = vec![
            entity("e0", "Hà Nội", EntityLabel::Location, 5),
            entity("e1", "sốt", EntityLabel::SymptomAndDisease, 20),
        ];
        let gold = vec![
            gold_entity("Hà Nội", EntityLabel::Location, 6),
            gold_entity("sốt", EntityLabel::SymptomAndDisease, 20),
        ];

        let relaxed = Evaluator::new().evaluate_entities(&predicted, &gold);
        assert_eq!(relaxed.true_positives, 2);

        let strict = Evaluator::new().strict().evaluate_entities(&predicted, &gold);
        assert_eq!(strict.true_positives, 1);
        assert_eq!(strict.false_positives, 1);
        assert_eq!(strict.false_negatives, 1);
    }

    #[test]
    fn test_label_mismatch_is_not_a_hit() {
        let predicted = vec![entity("e0", "Nam", EntityLabel::Gender, 0)];
        let gold = vec![gold_entity("Nam", EntityLabel::Name, 0)];
        let counts = Evaluator::new().evaluate_entities(&predicted, &gold);
        assert_eq!(counts.true_positives, 0);
    }

    #[test]
    fn test_gold_entity_matched_once() {
        let predicted = vec![
            entity("e0", "ho", EntityLabel::SymptomAndDisease, 0),
            entity("e1", "ho", EntityLabel::SymptomAndDisease, 10),
        ];
        let gold = vec![gold_entity("ho", EntityLabel::SymptomAndDisease, 0)];
        let counts = Evaluator::new().evaluate_entities(&predicted, &gold);
        assert_eq!(counts.true_positives, 1);
        assert_eq!(counts.false_positives, 1);
    }

    #[test]
    fn test_evaluate_relations_by_surface_text() {
        let doc = Document::new(
            "BN1 trú tại Huế",
            "BN1 trú tại Huế",
            vec![],
            vec![
                entity("a", "BN1", EntityLabel::PatientId, 0),
                entity("b", "Huế", EntityLabel::Location, 12),
            ],
            vec![Relation::new("a", "b", RelationType::LivedAt)],
        );
        let gold = vec![
            GoldRelation {
                source: "BN1".to_string(),
                relation_type: RelationType::LivedAt,
                target: "Huế".to_string(),
            },
            GoldRelation {
                source: "BN1".to_string(),
                relation_type: RelationType::Visited,
                target: "Huế".to_string(),
            },
        ];

        let counts = Evaluator::new().evaluate_relations(&doc, &gold);
        assert_eq!(counts.true_positives, 1);
        assert_eq!(counts.false_positives, 0);
        assert_eq!(counts.false_negatives, 1);
    }

    #[test]
    fn test_gold_sample_json() {
        let samples: Vec<GoldSample> = serde_json::from_str(
            r#"[{
                "text": "BN1 trú tại Huế",
                "entities": [{"text": "BN1", "label": "PATIENT_ID", "start_char": 0, "end_char": 3}],
                "relations": [{"source": "BN1", "relation_type": "LIVED_AT", "target": "Huế"}]
            }, {"text": "không có gì"}]"#,
        )
        .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].relations[0].relation_type, RelationType::LivedAt);
        assert!(samples[1].entities.is_empty());
    }

    #[test]
    fn test_evaluate_samples_end_to_end() {
        let pipeline = Pipeline::from_config(&medie_core::AppConfig::default()).unwrap();
        let samples = vec![GoldSample {
            text: "Bệnh nhân Nguyễn Văn A trú tại Quận Cầu Giấy.".to_string(),
            entities: vec![
                gold_entity("Nguyễn Văn A", EntityLabel::Name, 10),
                gold_entity("Quận Cầu Giấy", EntityLabel::Location, 31),
            ],
            relations: vec![GoldRelation {
                source: "Nguyễn Văn A".to_string(),
                relation_type: RelationType::LivedAt,
                target: "Quận Cầu Giấy".to_string(),
            }],
        }];

        let aggregate = Evaluator::new()
            .strict()
            .evaluate_samples(&pipeline, &samples)
            .unwrap();
        assert_eq!(aggregate.num_documents, 1);
        assert!((aggregate.entities.f1_score() - 1.0).abs() < 0.001);
        assert!((aggregate.relations.f1_score() - 1.0).abs() < 0.001);

        let report = aggregate.report();
        assert!(report.contains("Documents evaluated: 1"));
        assert!(report.contains("Relation Extraction:"));
    }
}
