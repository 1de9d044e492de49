//! Relation Extraction (RE) module
//!
//! Links entity pairs whose surrounding text contains a trigger keyword.
//! Rules are plain data (relation type, keywords, eligible subject and
//! object labels) so new relation types can be configured without touching
//! the matching loop.
//!
//! Pair gating and the context window deliberately use mixed start/end
//! offsets:
//! - distance is `|subject.end - object.start|`, so direction matters
//! - the window is `text[min(ends) .. max(starts)]`, empty when that range
//!   is inverted
//!
//! Both formulas are part of the observable behavior and must not be
//! replaced with a symmetric interval gap.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::RelationExtractor;
use medie_core::{
    CharText, Entity, EntityLabel, ExtractionConfig, MedieError, Relation, RelationType, Result,
};

/// Default maximum proximity distance, in characters
pub const DEFAULT_CHAR_THRESHOLD: usize = 100;

// ============================================================================
// Relation Rules
// ============================================================================

/// Binds a relation type to trigger keywords and eligible entity labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRule {
    pub relation_type: RelationType,
    /// Trigger phrases, tried in order
    pub keywords: Vec<String>,
    /// Labels allowed as subject
    pub source_types: Vec<EntityLabel>,
    /// Labels allowed as object
    pub target_types: Vec<EntityLabel>,
}

impl RelationRule {
    pub fn new(
        relation_type: RelationType,
        keywords: &[&str],
        source_types: &[EntityLabel],
        target_types: &[EntityLabel],
    ) -> Self {
        Self {
            relation_type,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            source_types: source_types.to_vec(),
            target_types: target_types.to_vec(),
        }
    }

    /// Whether the (subject, object) label pair is eligible for this rule
    pub fn admits(&self, subject: EntityLabel, object: EntityLabel) -> bool {
        self.source_types.contains(&subject) && self.target_types.contains(&object)
    }

    /// First keyword, in configured order, contained in `context`
    pub fn first_match(&self, context: &str) -> Option<&str> {
        self.keywords
            .iter()
            .map(String::as_str)
            .find(|kw| context.contains(kw))
    }

    fn validate(&self) -> Result<()> {
        if self.keywords.is_empty() {
            return Err(MedieError::InvalidRule(format!(
                "{} has no keywords",
                self.relation_type
            )));
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(MedieError::InvalidRule(format!(
                "{} has a blank keyword",
                self.relation_type
            )));
        }
        if self.source_types.is_empty() || self.target_types.is_empty() {
            return Err(MedieError::InvalidRule(format!(
                "{} needs at least one source and one target label",
                self.relation_type
            )));
        }
        Ok(())
    }
}

/// Built-in rules for Vietnamese epidemiological narratives
pub fn default_rules() -> Vec<RelationRule> {
    use EntityLabel::*;

    vec![
        RelationRule::new(
            RelationType::LivedAt,
            &["trú tại", "địa chỉ", "ở tại", "thường trú"],
            &[PatientId, Name, Gender],
            &[Location],
        ),
        RelationRule::new(
            RelationType::HasSymptom,
            &["sốt", "ho", "biểu hiện", "triệu chứng", "đau", "mệt"],
            &[PatientId, Name],
            &[SymptomAndDisease],
        ),
        RelationRule::new(
            RelationType::Visited,
            &["đi đến", "tới", "di chuyển", "có mặt", "ngồi"],
            &[PatientId, Name],
            &[Location],
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    rules: Vec<RelationRule>,
}

/// Parse a TOML rule table (`[[rules]]` entries)
pub fn parse_rules(content: &str) -> Result<Vec<RelationRule>> {
    let file: RuleFile =
        toml::from_str(content).map_err(|e| MedieError::InvalidRule(e.to_string()))?;
    Ok(file.rules)
}

/// Load a TOML rule table from disk
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<RelationRule>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_rules(&content)
}

// ============================================================================
// Rule-based RE
// ============================================================================

/// Keyword-triggered relation extractor
#[derive(Debug, Clone)]
pub struct RuleBasedRe {
    rules: Vec<RelationRule>,
    char_threshold: usize,
}

impl RuleBasedRe {
    /// Create an extractor with the built-in rules and default threshold
    pub fn new() -> Self {
        Self {
            rules: normalize_keywords(default_rules()),
            char_threshold: DEFAULT_CHAR_THRESHOLD,
        }
    }

    /// Create an extractor from a custom rule table
    ///
    /// Fails on an empty table or a rule without keywords or labels.
    pub fn with_rules(rules: Vec<RelationRule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(MedieError::InvalidRule("rule table is empty".to_string()));
        }
        for rule in &rules {
            rule.validate()?;
        }

        Ok(Self {
            rules: normalize_keywords(rules),
            char_threshold: DEFAULT_CHAR_THRESHOLD,
        })
    }

    /// Build from configuration, loading the rule file when one is set
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let re = match &config.rules_path {
            Some(path) => Self::with_rules(load_rules(path)?)?,
            None => Self::new(),
        };
        Ok(re.with_threshold(config.char_threshold))
    }

    /// Set the proximity threshold
    pub fn with_threshold(mut self, char_threshold: usize) -> Self {
        self.char_threshold = char_threshold;
        self
    }

    pub fn rules(&self) -> &[RelationRule] {
        &self.rules
    }

    pub fn char_threshold(&self) -> usize {
        self.char_threshold
    }

    /// Extract relations between every ordered pair of entities
    ///
    /// Output order is deterministic: subjects and objects are visited by
    /// ascending `start_char` (ties keep input order), then rules in
    /// configuration order.
    pub fn extract_relations(&self, text: &str, entities: &[Entity]) -> Vec<Relation> {
        let mut relations = Vec::new();
        if entities.len() < 2 {
            return relations;
        }

        let text = CharText::new(text);

        let mut ordered: Vec<&Entity> = entities.iter().collect();
        ordered.sort_by_key(|e| e.start_char);

        for (i, subject) in ordered.iter().enumerate() {
            for (j, object) in ordered.iter().enumerate() {
                if i == j || subject.id == object.id {
                    continue;
                }

                let distance = subject.end_char.abs_diff(object.start_char);
                if distance > self.char_threshold {
                    continue;
                }

                let applicable: Vec<&RelationRule> = self
                    .rules
                    .iter()
                    .filter(|rule| rule.admits(subject.label, object.label))
                    .collect();
                if applicable.is_empty() {
                    continue;
                }

                let context = context_window(&text, subject, object);

                for rule in applicable {
                    if let Some(keyword) = rule.first_match(&context) {
                        trace!(
                            source = %subject.id,
                            target = %object.id,
                            relation = %rule.relation_type,
                            keyword,
                            "Relation matched"
                        );
                        relations.push(
                            Relation::new(&subject.id, &object.id, rule.relation_type)
                                .with_evidence(keyword),
                        );
                    }
                }
            }
        }

        debug!(
            entities = entities.len(),
            relations = relations.len(),
            "Relation extraction finished"
        );
        relations
    }
}

impl Default for RuleBasedRe {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationExtractor for RuleBasedRe {
    fn extract(&self, text: &str, entities: &[Entity]) -> Result<Vec<Relation>> {
        Ok(self.extract_relations(text, entities))
    }
}

/// Lower-cased text between two spans
///
/// Empty when the spans overlap or touch so that `min(ends) >= max(starts)`.
fn context_window(text: &CharText<'_>, subject: &Entity, object: &Entity) -> String {
    let start = subject.end_char.min(object.end_char);
    let end = subject.start_char.max(object.start_char);
    if start < end {
        text.slice(start, end).to_lowercase()
    } else {
        String::new()
    }
}

/// Context is lower-cased before matching, so keywords must be too
fn normalize_keywords(mut rules: Vec<RelationRule>) -> Vec<RelationRule> {
    for rule in &mut rules {
        for kw in &mut rule.keywords {
            *kw = kw.to_lowercase();
        }
    }
    rules
}

// ============================================================================
// Tests
// ============================================================================
