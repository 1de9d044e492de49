//! End-to-end extraction pipeline
//!
//! normalize -> tokenize -> recognize entities -> extract relations ->
//! assemble a [`Document`].

use tracing::{debug, info, instrument};

use crate::ner::entity_source_for;
use crate::relation::RuleBasedRe;
use crate::{EntitySource, RelationExtractor};
use medie_core::{AppConfig, Document, Result};
use medie_preprocess::{CompoundSegmenter, TextPreprocessor};

/// Narrative-to-document pipeline
///
/// Components are fixed at construction; `process` takes `&self` and may be
/// shared across threads.
pub struct Pipeline {
    preprocessor: TextPreprocessor,
    entity_source: Box<dyn EntitySource>,
    relation_extractor: Box<dyn RelationExtractor>,
}

impl Pipeline {
    pub fn new(
        preprocessor: TextPreprocessor,
        entity_source: Box<dyn EntitySource>,
        relation_extractor: Box<dyn RelationExtractor>,
    ) -> Self {
        Self {
            preprocessor,
            entity_source,
            relation_extractor,
        }
    }

    /// Build every component from configuration
    ///
    /// Fails when the relation rule file cannot be loaded.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let preprocessor = if config.preprocess.segment {
            TextPreprocessor::new().with_segmenter(CompoundSegmenter::new())
        } else {
            TextPreprocessor::new()
        };

        let relation_extractor = RuleBasedRe::from_config(&config.extraction)?;
        info!(
            rules = relation_extractor.rules().len(),
            char_threshold = relation_extractor.char_threshold(),
            segment = config.preprocess.segment,
            "Pipeline configured"
        );

        Ok(Self::new(
            preprocessor,
            entity_source_for(&config.ner),
            Box::new(relation_extractor),
        ))
    }

    /// Replace the entity source, e.g. with precomputed entities
    pub fn with_entity_source(mut self, entity_source: Box<dyn EntitySource>) -> Self {
        self.entity_source = entity_source;
        self
    }

    pub fn entity_source_name(&self) -> &str {
        self.entity_source.name()
    }

    /// Run one narrative through every stage
    #[instrument(skip_all, fields(chars = text.chars().count()))]
    pub fn process(&self, text: &str) -> Result<Document> {
        let normalized = self.preprocessor.clean_text(text);
        let tokens = self.preprocessor.tokenize(&normalized);
        debug!(tokens = tokens.len(), "Text preprocessed");

        let entities = self.entity_source.predict(&normalized, Some(&tokens))?;
        let relations = self.relation_extractor.extract(&normalized, &entities)?;

        let document = Document::new(text, normalized, tokens, entities, relations);
        document.validate()?;

        info!(
            document_id = %document.id(),
            source = self.entity_source.name(),
            entities = document.entities().len(),
            relations = document.relations().len(),
            "Document processed"
        );
        Ok(document)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("preprocessor", &self.preprocessor)
            .field("entity_source", &self.entity_source.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::LexiconModel;
    use crate::ner::{PrecomputedEntities, SequenceTaggerNer};
    use medie_core::{EntityLabel, RelationType};

    #[test]
    fn test_default_pipeline_builds_document() {
        let pipeline = Pipeline::from_config(&AppConfig::default()).unwrap();
        assert_eq!(pipeline.entity_source_name(), "gliner");

        let doc = pipeline
            .process("  Bệnh nhân Nguyễn Văn A trú tại Quận Cầu Giấy.  ")
            .unwrap();

        assert_eq!(
            doc.normalized_text(),
            "Bệnh nhân Nguyễn Văn A trú tại Quận Cầu Giấy."
        );
        assert_eq!(doc.tokens().len(), 10);
        let labels: Vec<EntityLabel> = doc.entities().iter().map(|e| e.label).collect();
        assert_eq!(labels, vec![EntityLabel::Name, EntityLabel::Location]);
        assert_eq!(doc.relations().len(), 1);
        assert_eq!(doc.relations()[0].relation_type, RelationType::LivedAt);
    }

    #[test]
    fn test_empty_input_yields_empty_document() {
        let pipeline = Pipeline::from_config(&AppConfig::default()).unwrap();
        let doc = pipeline.process("   ").unwrap();
        assert_eq!(doc.normalized_text(), "");
        assert!(doc.tokens().is_empty());
        assert!(doc.entities().is_empty());
        assert!(doc.relations().is_empty());
    }

    #[test]
    fn test_segmented_sequence_tagger_recovers_offsets() {
        let mut config = AppConfig::default();
        config.preprocess.segment = true;
        let pipeline = Pipeline::from_config(&config)
            .unwrap()
            .with_entity_source(Box::new(SequenceTaggerNer::new(LexiconModel::new())));

        let doc = pipeline
            .process("Bệnh nhân Nguyễn Văn A trú tại Quận Cầu Giấy.")
            .unwrap();

        assert_eq!(doc.tokens()[0], "Bệnh_nhân");
        let name = doc
            .entities()
            .iter()
            .find(|e| e.label == EntityLabel::Name)
            .unwrap();
        assert_eq!((name.start_char, name.end_char), (10, 22));
        assert_eq!(name.text, "Nguyễn Văn A");
    }

    #[test]
    fn test_precomputed_source_drives_relations() {
        let entities = PrecomputedEntities::from_json(
            r#"[
                {"id": "p", "text": "BN5", "label": "PATIENT_ID", "start_char": 0, "end_char": 3},
                {"id": "s", "text": "sốt", "label": "SYMPTOM_AND_DISEASE", "start_char": 22, "end_char": 25}
            ]"#,
        )
        .unwrap();
        let pipeline = Pipeline::from_config(&AppConfig::default())
            .unwrap()
            .with_entity_source(Box::new(entities));

        let doc = pipeline.process("BN5 có triệu chứng bị sốt").unwrap();
        assert_eq!(doc.relations().len(), 1);
        assert_eq!(doc.relations()[0].relation_type, RelationType::HasSymptom);
        assert_eq!(doc.relations()[0].evidence.as_deref(), Some("triệu chứng"));
    }
}
