//! `$name` templates.
//!
//! Captured variables use lower-case names; engine-provided variables are
//! upper-case so they never collide with a capture group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SERVER: &str = "SERVER";
pub const SUFFIX: &str = "SUFFIX";
pub const WIKIID: &str = "WIKIID";
pub const VERSION: &str = "VERSION";
pub const CODE: &str = "CODE";
pub const DATA: &str = "DATA";
pub const CACHE: &str = "CACHE";
pub const CONFIG: &str = "CONFIG";

/// Named values available to templates, keyed without the leading `$`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace every `$name` with its value.
    ///
    /// The longest known name prefixing the word after `$` wins, so `$wikiwiki`
    /// expands `$wiki` when only `wiki` is known. Unknown placeholders are kept.
    pub fn substitute(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        self.scan(template, |piece| match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Known(name, rest) => {
                out.push_str(self.get(name).unwrap_or_default());
                out.push_str(rest);
            }
            Piece::Unknown(word) => {
                out.push('$');
                out.push_str(word);
            }
        });
        out
    }

    /// Names of the known variables `template` refers to.
    pub fn referenced_by(&self, template: &str) -> Vec<String> {
        let mut names = Vec::new();
        self.scan(template, |piece| {
            if let Piece::Known(name, _) = piece {
                if !names.iter().any(|n: &String| n == name) {
                    names.push(name.to_string());
                }
            }
        });
        names
    }

    fn scan<'t, F: FnMut(Piece<'t>)>(&self, template: &'t str, mut emit: F) {
        let mut rest = template;
        while let Some(pos) = rest.find('$') {
            emit(Piece::Text(&rest[..pos]));
            let after = &rest[pos + 1..];
            let word_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let word = &after[..word_len];

            let known = (1..=word.len())
                .rev()
                .find(|&len| self.values.contains_key(&word[..len]));
            match known {
                Some(len) => emit(Piece::Known(&word[..len], &word[len..])),
                None => emit(Piece::Unknown(word)),
            }
            rest = &after[word_len..];
        }
        emit(Piece::Text(rest));
    }
}

enum Piece<'t> {
    Text(&'t str),
    Known(&'t str, &'t str),
    Unknown(&'t str),
}
