//! Property tests for rule-based relation extraction

use medie_core::{Entity, EntityLabel};
use medie_extractor::relation::default_rules;
use medie_extractor::RuleBasedRe;
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("trú tại "),
            Just("Trú Tại "),
            Just("sốt "),
            Just("ho, "),
            Just("Hà Nội "),
            Just("đi đến "),
            Just("và "),
            Just("BN7 "),
            Just("..."),
        ],
        0..40,
    )
    .prop_map(|parts| parts.concat())
}

fn arb_entities() -> impl Strategy<Value = Vec<Entity>> {
    prop::collection::vec((0..EntityLabel::ALL.len(), 0usize..200, 0usize..15), 0..8).prop_map(
        |specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(idx, (label, start, len))| {
                    Entity::new(
                        format!("e{idx}"),
                        "x",
                        EntityLabel::ALL[label],
                        start,
                        start + len,
                    )
                })
                .collect()
        },
    )
}

fn find<'a>(entities: &'a [Entity], id: &str) -> &'a Entity {
    entities.iter().find(|e| e.id == id).unwrap()
}

fn window(text: &str, a: &Entity, b: &Entity) -> String {
    let start = a.end_char.min(b.end_char);
    let end = a.start_char.max(b.start_char);
    if start >= end {
        return String::new();
    }
    text.chars()
        .skip(start)
        .take(end - start)
        .collect::<String>()
        .to_lowercase()
}

proptest! {
    #[test]
    fn relations_never_link_an_entity_to_itself(text in arb_text(), entities in arb_entities()) {
        let re = RuleBasedRe::new();
        for rel in re.extract_relations(&text, &entities) {
            prop_assert_ne!(rel.source_id, rel.target_id);
        }
    }

    #[test]
    fn relations_respect_threshold(
        text in arb_text(),
        entities in arb_entities(),
        threshold in 0usize..120,
    ) {
        let re = RuleBasedRe::new().with_threshold(threshold);
        for rel in re.extract_relations(&text, &entities) {
            let subject = find(&entities, &rel.source_id);
            let object = find(&entities, &rel.target_id);
            prop_assert!(subject.end_char.abs_diff(object.start_char) <= threshold);
        }
    }

    #[test]
    fn relations_respect_type_gating_and_keywords(text in arb_text(), entities in arb_entities()) {
        let rules = default_rules();
        let re = RuleBasedRe::new();
        for rel in re.extract_relations(&text, &entities) {
            let subject = find(&entities, &rel.source_id);
            let object = find(&entities, &rel.target_id);
            let rule = rules
                .iter()
                .find(|r| r.relation_type == rel.relation_type)
                .unwrap();
            prop_assert!(rule.admits(subject.label, object.label));

            let keyword = rel.evidence.clone().unwrap();
            prop_assert!(window(&text, subject, object).contains(&keyword));
        }
    }

    #[test]
    fn extraction_is_deterministic(text in arb_text(), entities in arb_entities()) {
        let re = RuleBasedRe::new();
        prop_assert_eq!(
            re.extract_relations(&text, &entities),
            re.extract_relations(&text, &entities)
        );
    }

    #[test]
    fn fewer_than_two_entities_yield_nothing(text in arb_text(), entities in arb_entities()) {
        let re = RuleBasedRe::new();
        let single: Vec<Entity> = entities.into_iter().take(1).collect();
        prop_assert!(re.extract_relations(&text, &single).is_empty());
    }
}
