//! Activation order.
//!
//! Components sort by mechanism (dependency-managed, inline, registry,
//! still awaiting), then kind (skins first), then sequence. Inside the
//! dependency-managed group a component never precedes one it depends on;
//! cycles fall back to the plain order.

use std::collections::BTreeMap;

use crate::components::activator::{ActivationState, PlannedComponent};

/// Sort weight of a state; lower activates first.
pub fn mechanism_weight(state: ActivationState) -> u8 {
    match state {
        ActivationState::Composer => 0,
        ActivationState::Inline => 1,
        ActivationState::Registry => 2,
        ActivationState::AwaitingEnvironment => 3,
        _ => 4,
    }
}

/// Order `entries` and renumber their sequences densely from 0.
///
/// `graph` maps a component key to the keys it depends on.
pub fn order(mut entries: Vec<PlannedComponent>, graph: &BTreeMap<String, Vec<String>>) -> Vec<PlannedComponent> {
    entries.sort_by_key(|e| (mechanism_weight(e.state), e.kind.weight(), e.sequence));

    let split = entries
        .iter()
        .position(|e| e.state != ActivationState::Composer)
        .unwrap_or(entries.len());
    let rest = entries.split_off(split);
    let mut ordered = dependencies_first(entries, graph);
    ordered.extend(rest);

    for (index, entry) in ordered.iter_mut().enumerate() {
        entry.sequence = index as i64;
    }
    ordered
}

fn dependencies_first(
    mut pending: Vec<PlannedComponent>,
    graph: &BTreeMap<String, Vec<String>>,
) -> Vec<PlannedComponent> {
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let blocked = |entry: &PlannedComponent| {
            graph.get(&entry.key).is_some_and(|deps| {
                deps.iter()
                    .any(|dep| *dep != entry.key && pending.iter().any(|p| p.key == *dep))
            })
        };
        let next = pending.iter().position(|e| !blocked(e)).unwrap_or(0);
        ordered.push(pending.remove(next));
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::candidate::ComponentKind;

    fn entry(key: &str, kind: ComponentKind, state: ActivationState, sequence: i64) -> PlannedComponent {
        PlannedComponent::new(key, kind, key, state, sequence)
    }

    fn keys(entries: &[PlannedComponent]) -> Vec<&str> {
        entries.iter().map(|e| e.key.as_str()).collect()
    }

    #[test]
    fn test_mechanism_then_kind_then_sequence() {
        let ordered = order(
            vec![
                entry("extension-R", ComponentKind::Extension, ActivationState::Registry, 0),
                entry("extension-I", ComponentKind::Extension, ActivationState::Inline, 1),
                entry("skin-I", ComponentKind::Skin, ActivationState::Inline, 2),
                entry("extension-C", ComponentKind::Extension, ActivationState::Composer, 3),
            ],
            &BTreeMap::new(),
        );
        assert_eq!(keys(&ordered), vec!["extension-C", "skin-I", "extension-I", "extension-R"]);
        let sequences: Vec<_> = ordered.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_dependency_sorts_first() {
        let graph = BTreeMap::from([("extension-A".to_string(), vec!["extension-B".to_string()])]);
        let ordered = order(
            vec![
                entry("extension-A", ComponentKind::Extension, ActivationState::Composer, 0),
                entry("extension-B", ComponentKind::Extension, ActivationState::Composer, 1),
            ],
            &graph,
        );
        assert_eq!(keys(&ordered), vec!["extension-B", "extension-A"]);
    }

    #[test]
    fn test_dependency_beats_kind() {
        let graph = BTreeMap::from([("skin-S".to_string(), vec!["extension-E".to_string()])]);
        let ordered = order(
            vec![
                entry("skin-S", ComponentKind::Skin, ActivationState::Composer, 0),
                entry("extension-E", ComponentKind::Extension, ActivationState::Composer, -1),
            ],
            &graph,
        );
        assert_eq!(keys(&ordered), vec!["extension-E", "skin-S"]);
    }

    #[test]
    fn test_cycle_falls_back_to_sequence() {
        let graph = BTreeMap::from([
            ("extension-A".to_string(), vec!["extension-B".to_string()]),
            ("extension-B".to_string(), vec!["extension-A".to_string()]),
        ]);
        let ordered = order(
            vec![
                entry("extension-B", ComponentKind::Extension, ActivationState::Composer, 4),
                entry("extension-A", ComponentKind::Extension, ActivationState::Composer, 2),
            ],
            &graph,
        );
        assert_eq!(keys(&ordered), vec!["extension-A", "extension-B"]);
    }
}
