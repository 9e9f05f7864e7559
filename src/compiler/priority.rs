//! Priority ledger.
//!
//! One map from name to `(priority, value)`, so an entry can only be
//! replaced through the priority check.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compiler::merge::merge_array_diff;

/// Override priority of a configuration value. Higher wins; ties overwrite.
pub type Priority = u8;

/// Tentative entry created while a wildcard source is examined.
pub const PLACEHOLDER: Priority = 0;
/// Literal `default` selector.
pub const DEFAULT: Priority = 1;
/// `default` entry of a wildcard source.
pub const WILDCARD_DEFAULT: Priority = 2;
/// Suffix match, or a wildcard `default` promoted by the source's default selector.
pub const SUFFIX: Priority = 3;
/// Identifier match.
pub const IDENTIFIER: Priority = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub priority: Priority,
    pub value: Value,
}

/// Name → prioritized value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    entries: BTreeMap<String, Entry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|e| &e.value)
    }

    pub fn priority(&self, name: &str) -> Option<Priority> {
        self.entries.get(name).map(|e| e.priority)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    /// Store `value` unless a strictly higher priority holds the name.
    pub fn apply(&mut self, name: &str, priority: Priority, value: Value) -> bool {
        if self.priority(name).is_some_and(|stored| stored > priority) {
            return false;
        }
        self.entries.insert(name.to_string(), Entry { priority, value });
        true
    }

    /// Array-diff variant of [`Ledger::apply`]: merge instead of replacing.
    pub fn merge_apply(&mut self, name: &str, priority: Priority, value: Value) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) if entry.priority > priority => false,
            Some(entry) if entry.priority == PLACEHOLDER => {
                *entry = Entry { priority, value };
                true
            }
            Some(entry) => {
                entry.priority = priority;
                merge_array_diff(&mut entry.value, value);
                true
            }
            None => {
                self.entries.insert(name.to_string(), Entry { priority, value });
                true
            }
        }
    }

    /// Reserve `name` at placeholder priority. Returns whether it was new.
    pub fn placeholder(&mut self, name: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(
            name.to_string(),
            Entry {
                priority: PLACEHOLDER,
                value: Value::Null,
            },
        );
        true
    }

    /// Drop `name` if it still only holds a placeholder.
    pub fn discard_placeholder(&mut self, name: &str) -> bool {
        if self.priority(name) == Some(PLACEHOLDER) {
            self.entries.remove(name);
            return true;
        }
        false
    }
}
