//! Source selectors.
//!
//! A literal selector applies a whole source at one priority. A wildcard
//! selector applies per setting: each value is a dictionary whose keys are
//! compared with what the `*` captures from the identifier and the suffix.

use regex::Regex;

use crate::compiler::priority::{self, Priority};

/// How a configuration source is matched against a tenant.
#[derive(Debug, Clone)]
pub enum Selector {
    Literal(String),
    Wildcard(Regex),
}

impl Selector {
    /// Parse an already substituted selector.
    pub fn parse(selector: &str) -> Result<Self, regex::Error> {
        if !selector.contains('*') {
            return Ok(Selector::Literal(selector.to_string()));
        }
        let pattern = selector
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("(.+)");
        Regex::new(&format!("^{}$", pattern)).map(Selector::Wildcard)
    }
}

/// Priority of a literal selector for a tenant, or `None` when it does not apply.
pub fn literal_priority(key: &str, identifier: &str, suffix: &str) -> Option<Priority> {
    if key == identifier {
        Some(priority::IDENTIFIER)
    } else if key == suffix {
        Some(priority::SUFFIX)
    } else if key == "default" {
        Some(priority::DEFAULT)
    } else {
        None
    }
}

/// Keys a wildcard source's values are looked up with, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardKeys {
    keys: Vec<(String, Priority)>,
}

impl WildcardKeys {
    pub fn derive(
        pattern: &Regex,
        identifier: &str,
        suffix: &str,
        default_selector: Option<&str>,
    ) -> Self {
        let capture = |subject: &str| {
            pattern
                .captures(subject)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let mut keys = Vec::with_capacity(3);
        if let Some(key) = capture(identifier) {
            keys.push((key, priority::IDENTIFIER));
        }
        if let Some(key) = capture(suffix) {
            keys.push((key, priority::SUFFIX));
        }
        let default_priority = if default_selector == Some(suffix) {
            priority::SUFFIX
        } else {
            priority::WILDCARD_DEFAULT
        };
        keys.push(("default".to_string(), default_priority));
        keys.sort_by(|a, b| b.1.cmp(&a.1));
        Self { keys }
    }

    /// Highest-priority entry of `values` this tenant selects.
    pub fn select<'v>(
        &self,
        values: &'v serde_json::Map<String, serde_json::Value>,
    ) -> Option<(Priority, &'v serde_json::Value)> {
        self.keys
            .iter()
            .find_map(|(key, priority)| values.get(key).map(|v| (*priority, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wildcard(selector: &str) -> Regex {
        match Selector::parse(selector).unwrap() {
            Selector::Wildcard(re) => re,
            Selector::Literal(_) => panic!("expected a wildcard"),
        }
    }

    #[test]
    fn test_literal_priorities() {
        assert_eq!(literal_priority("enwiki", "enwiki", "wiki"), Some(priority::IDENTIFIER));
        assert_eq!(literal_priority("wiki", "enwiki", "wiki"), Some(priority::SUFFIX));
        assert_eq!(literal_priority("default", "enwiki", "wiki"), Some(priority::DEFAULT));
        assert_eq!(literal_priority("frwiki", "enwiki", "wiki"), None);
        assert_eq!(literal_priority("same", "same", "same"), Some(priority::IDENTIFIER));
    }

    #[test]
    fn test_wildcard_escapes_literal_text() {
        let re = wildcard("*.wiki");
        assert!(re.is_match("en.wiki"));
        assert!(!re.is_match("enxwiki"));
    }

    #[test]
    fn test_wildcard_selection() {
        let keys = WildcardKeys::derive(&wildcard("*wiki"), "enwiki", "wiki", None);
        let values = json!({"default": 1, "en": 5});
        assert_eq!(
            keys.select(values.as_object().unwrap()),
            Some((priority::IDENTIFIER, &json!(5)))
        );

        let values = json!({"default": 1, "fr": 5});
        assert_eq!(
            keys.select(values.as_object().unwrap()),
            Some((priority::WILDCARD_DEFAULT, &json!(1)))
        );

        assert_eq!(keys.select(json!({"fr": 5}).as_object().unwrap()), None);
    }

    #[test]
    fn test_default_selector_promotes_default() {
        let keys = WildcardKeys::derive(&wildcard("*pedia"), "enpedia", "pedia", Some("pedia"));
        let values = json!({"default": 200});
        assert_eq!(
            keys.select(values.as_object().unwrap()),
            Some((priority::SUFFIX, &json!(200)))
        );
    }
}
