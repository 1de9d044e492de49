//! medie Graph - Knowledge graph rendering
//!
//! Turns extracted entities and relations into displayable notations:
//! Mermaid flowcharts, Graphviz DOT (through a petgraph [`KnowledgeGraph`])
//! and a plain-text entity table. Rendering never fails; empty input yields
//! an empty graph declaration.

use medie_core::{Entity, Relation};

pub mod knowledge;
pub mod mermaid;

pub use knowledge::{DotRenderer, EntityNode, KnowledgeGraph};
pub use mermaid::MermaidRenderer;

/// Trait for graph notations
pub trait GraphRenderer: Send + Sync {
    fn render(&self, entities: &[Entity], relations: &[Relation]) -> String;
}

/// Make an entity id usable as a graph identifier
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`.
pub fn safe_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Fixed-width `Text | Label | Confidence` table
pub fn entity_table(entities: &[Entity]) -> String {
    let mut lines = vec![
        format!("{:<20} | {:<20} | {:<10}", "Text", "Label", "Confidence"),
        "-".repeat(55),
    ];

    for entity in entities {
        let confidence = entity
            .confidence
            .map(|c| format!("{c:.2}"))
            .unwrap_or_else(|| "N/A".to_string());
        lines.push(format!(
            "{:<20} | {:<20} | {:<10}",
            entity.text,
            entity.label.as_str(),
            confidence
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use medie_core::EntityLabel;

    #[test]
    fn test_safe_id() {
        assert_eq!(safe_id("gli_0"), "gli_0");
        assert_eq!(safe_id("ent-1"), "ent_1");
        assert_eq!(safe_id("a b.c"), "a_b_c");
        assert_eq!(safe_id("bệnh"), "b_nh");
    }

    #[test]
    fn test_entity_table() {
        let entities = vec![
            Entity::new("a", "Hà Nội", EntityLabel::Location, 0, 6).with_confidence(0.856),
            Entity::new("b", "BN1", EntityLabel::PatientId, 8, 11),
        ];
        let table = entity_table(&entities);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Text                 | Label"));
        assert_eq!(lines[1], "-".repeat(55));
        assert!(lines[2].starts_with("Hà Nội               | LOCATION"));
        assert!(lines[2].contains("| 0.86"));
        assert!(lines[3].contains("| N/A"));
    }

    #[test]
    fn test_entity_table_empty_has_header() {
        assert_eq!(entity_table(&[]).lines().count(), 2);
    }
}
