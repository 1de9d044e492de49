//! In-memory knowledge graph and Graphviz DOT export

use std::collections::HashMap;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::warn;

use medie_core::{Entity, EntityLabel, Relation, RelationType};

use crate::GraphRenderer;

/// Node payload
#[derive(Debug, Clone, PartialEq)]
pub struct EntityNode {
    pub id: String,
    pub text: String,
    pub label: EntityLabel,
    /// Fill colour for the label family
    pub color: &'static str,
}

/// Fill colour by label family
pub fn fill_color(label: EntityLabel) -> &'static str {
    match label {
        EntityLabel::PatientId => "#FF9999",
        EntityLabel::Location => "#99CCFF",
        EntityLabel::SymptomAndDisease => "#FFFF99",
        EntityLabel::Date => "#99FF99",
        EntityLabel::Job => "#FFCC99",
        EntityLabel::Organization => "#CC99FF",
        _ => "#E0E0E0",
    }
}

/// Directed graph of entities linked by relations
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<EntityNode, RelationType>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    /// Build from extraction output
    ///
    /// Duplicate entity ids keep the first entity; relations whose endpoints
    /// are unknown are skipped.
    pub fn build(entities: &[Entity], relations: &[Relation]) -> Self {
        let mut kg = Self::default();

        for entity in entities {
            if kg.index.contains_key(&entity.id) {
                warn!(id = %entity.id, "Duplicate entity id, keeping the first");
                continue;
            }
            let node = kg.graph.add_node(EntityNode {
                id: entity.id.clone(),
                text: entity.text.clone(),
                label: entity.label,
                color: fill_color(entity.label),
            });
            kg.index.insert(entity.id.clone(), node);
        }

        for relation in relations {
            let endpoints = (
                kg.index.get(&relation.source_id),
                kg.index.get(&relation.target_id),
            );
            match endpoints {
                (Some(&source), Some(&target)) => {
                    kg.graph.add_edge(source, target, relation.relation_type);
                }
                _ => warn!(
                    source = %relation.source_id,
                    target = %relation.target_id,
                    "Relation references an unknown entity, skipping"
                ),
            }
        }

        kg
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node(&self, id: &str) -> Option<&EntityNode> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    /// Outgoing relations of an entity, in insertion order
    pub fn outgoing(&self, id: &str) -> Vec<(RelationType, &EntityNode)> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| (edge.id(), *edge.weight(), &self.graph[edge.target()]))
            .collect();
        edges.sort_by_key(|(edge_id, _, _)| *edge_id);
        edges.into_iter().map(|(_, rel, node)| (rel, node)).collect()
    }

    pub fn graph(&self) -> &DiGraph<EntityNode, RelationType> {
        &self.graph
    }

    /// Graphviz DOT with filled, labelled nodes and labelled edges
    pub fn to_dot(&self) -> String {
        let dot = Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, edge| format!("label = \"{}\"", edge.weight()),
            &|_, (_, node)| {
                format!(
                    "label = \"{}\\n{}\" style = filled fillcolor = \"{}\"",
                    escape(&node.text),
                    node.label,
                    node.color
                )
            },
        );
        format!("{dot:?}")
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Graphviz DOT notation
#[derive(Debug, Clone, Copy, Default)]
pub struct DotRenderer;

impl GraphRenderer for DotRenderer {
    fn render(&self, entities: &[Entity], relations: &[Relation]) -> String {
        KnowledgeGraph::build(entities, relations).to_dot()
    }
}
