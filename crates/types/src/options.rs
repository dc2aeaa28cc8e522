//! Option lists and option trees.
//!
//! Select-style widgets consume flat option lists; cascaders consume trees.
//! `value` must be unique within one sibling group. Duplicate values at
//! different depths make path resolution ambiguous: the helpers here return
//! the first depth-first match.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::value::FieldValue;

/// One selectable option, possibly with a nested child group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub label: String,
    pub value: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<OptionEntry>>,
    /// The raw dictionary row this option was mapped from, when it came
    /// from a dictionary resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<JsonValue>,
}

impl OptionEntry {
    pub fn new(label: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            children: None,
            raw: None,
        }
    }

    pub fn with_children(mut self, children: Vec<OptionEntry>) -> Self {
        self.children = Some(children);
        self
    }
}

/// Collects the root-to-node path of the first entry matching `predicate`,
/// depth first. Empty when nothing matches.
pub fn find_tree_path<'a>(entries: &'a [OptionEntry], predicate: &dyn Fn(&OptionEntry) -> bool) -> Vec<&'a OptionEntry> {
    fn walk<'a>(entries: &'a [OptionEntry], predicate: &dyn Fn(&OptionEntry) -> bool, path: &mut Vec<&'a OptionEntry>) -> bool {
        for entry in entries {
            path.push(entry);
            if predicate(entry) {
                return true;
            }
            if let Some(children) = &entry.children {
                if walk(children, predicate, path) {
                    return true;
                }
            }
            path.pop();
        }
        false
    }

    let mut path = Vec::new();
    if walk(entries, predicate, &mut path) { path } else { Vec::new() }
}

/// Flattens an option tree into depth-first order.
pub fn flatten_tree(entries: &[OptionEntry]) -> Vec<&OptionEntry> {
    let mut flat = Vec::new();
    for entry in entries {
        flat.push(entry);
        if let Some(children) = &entry.children {
            flat.extend(flatten_tree(children));
        }
    }
    flat
}

/// First entry matching `predicate` anywhere in the tree, depth first.
pub fn deep_find<'a>(entries: &'a [OptionEntry], predicate: &dyn Fn(&OptionEntry) -> bool) -> Option<&'a OptionEntry> {
    flatten_tree(entries).into_iter().find(|entry| predicate(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Vec<OptionEntry> {
        vec![
            OptionEntry::new("Asia", "asia").with_children(vec![
                OptionEntry::new("China", "cn"),
                OptionEntry::new("Japan", "jp"),
            ]),
            OptionEntry::new("Europe", "eu").with_children(vec![OptionEntry::new("France", "fr")]),
        ]
    }

    #[test]
    fn path_walks_root_to_leaf() {
        let options = tree();
        let path = find_tree_path(&options, &|entry| entry.value == FieldValue::Text("jp".into()));
        let labels: Vec<_> = path.iter().map(|entry| entry.label.as_str()).collect();
        assert_eq!(labels, vec!["Asia", "Japan"]);
    }

    #[test]
    fn missing_value_yields_empty_path() {
        let options = tree();
        assert!(find_tree_path(&options, &|entry| entry.value == FieldValue::Text("xx".into())).is_empty());
    }

    #[test]
    fn duplicate_values_resolve_to_first_dfs_match() {
        let options = vec![
            OptionEntry::new("A", "dup").with_children(vec![OptionEntry::new("A child", "x")]),
            OptionEntry::new("B", "b").with_children(vec![OptionEntry::new("B child", "dup")]),
        ];
        let path = find_tree_path(&options, &|entry| entry.value == FieldValue::Text("dup".into()));
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].label, "A");
    }

    #[test]
    fn deep_find_sees_nested_entries() {
        let options = tree();
        assert_eq!(deep_find(&options, &|entry| entry.label == "France").unwrap().label, "France");
        assert!(deep_find(&options, &|entry| entry.label == "Mars").is_none());
    }
}
