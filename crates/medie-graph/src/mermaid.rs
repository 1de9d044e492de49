//! Mermaid flowchart rendering

use std::collections::{HashMap, HashSet};

use medie_core::{Entity, Relation};

use crate::{safe_id, GraphRenderer};

/// Top-down Mermaid flowchart, one node per entity and one edge per relation
#[derive(Debug, Clone, Copy, Default)]
pub struct MermaidRenderer;

/// Assign each entity a distinct node id
///
/// Ids that sanitize to an already used identifier get the entity's index
/// appended. Repeated entity ids keep their first node.
fn node_ids(entities: &[Entity]) -> HashMap<&str, String> {
    let mut assigned = HashMap::new();
    let mut used = HashSet::new();

    for (idx, entity) in entities.iter().enumerate() {
        if assigned.contains_key(entity.id.as_str()) {
            continue;
        }
        let mut node = safe_id(&entity.id);
        if used.contains(&node) {
            node = format!("{node}_{idx}");
            while used.contains(&node) {
                node.push('_');
            }
        }
        used.insert(node.clone());
        assigned.insert(entity.id.as_str(), node);
    }
    assigned
}

impl GraphRenderer for MermaidRenderer {
    fn render(&self, entities: &[Entity], relations: &[Relation]) -> String {
        let ids = node_ids(entities);
        let node = |id: &str| ids.get(id).cloned().unwrap_or_else(|| safe_id(id));

        let mut lines = vec!["graph TD".to_string()];

        for entity in entities {
            let text: String = entity
                .text
                .chars()
                .filter(|c| *c != '"' && *c != '\'')
                .collect();
            lines.push(format!(
                "    {}(\"{}<br/><small>{}</small>\")",
                node(&entity.id),
                text,
                entity.label
            ));
        }

        for relation in relations {
            lines.push(format!(
                "    {} -- \"{}\" --> {}",
                node(&relation.source_id),
                relation.relation_type,
                node(&relation.target_id)
            ));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medie_core::{EntityLabel, RelationType};

    #[test]
    fn test_render_nodes_and_edges() {
        let entities = vec![
            Entity::new("gli-0", "Nguyễn \"Văn\" A", EntityLabel::Name, 10, 22),
            Entity::new("gli-1", "Quận Cầu Giấy", EntityLabel::Location, 41, 54),
        ];
        let relations = vec![Relation::new("gli-0", "gli-1", RelationType::LivedAt)];

        let out = MermaidRenderer.render(&entities, &relations);
        assert_eq!(
            out,
            "graph TD\n\
             \x20   gli_0(\"Nguyễn Văn A<br/><small>NAME</small>\")\n\
             \x20   gli_1(\"Quận Cầu Giấy<br/><small>LOCATION</small>\")\n\
             \x20   gli_0 -- \"LIVED_AT\" --> gli_1"
        );
    }

    #[test]
    fn test_colliding_ids_get_distinct_nodes() {
        let entities = vec![
            Entity::new("a-b", "BN1", EntityLabel::PatientId, 0, 3),
            Entity::new("a_b", "Huế", EntityLabel::Location, 12, 15),
            Entity::new("bệnh", "sốt", EntityLabel::SymptomAndDisease, 20, 23),
            Entity::new("bếnh", "ho", EntityLabel::SymptomAndDisease, 25, 27),
        ];
        let relations = vec![
            Relation::new("a-b", "a_b", RelationType::LivedAt),
            Relation::new("a-b", "bếnh", RelationType::HasSymptom),
        ];

        let out = MermaidRenderer.render(&entities, &relations);
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[1].starts_with("    a_b(\"BN1"));
        assert!(lines[2].starts_with("    a_b_1(\"Huế"));
        assert!(lines[3].starts_with("    b_nh(\"sốt"));
        assert!(lines[4].starts_with("    b_nh_3(\"ho"));
        assert_eq!(lines[5], "    a_b -- \"LIVED_AT\" --> a_b_1");
        assert_eq!(lines[6], "    a_b -- \"HAS_SYMPTOM\" --> b_nh_3");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(MermaidRenderer.render(&[], &[]), "graph TD");
    }
}
