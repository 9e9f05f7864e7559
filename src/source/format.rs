//! Supported structured file formats.
//!
//! The format is chosen once from the file extension; every format yields a
//! `serde_json::Value` so the rest of the engine never looks at syntax.

use std::path::Path;

use serde_json::{Map, Value};

/// A structured file format, selected by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// `.toml`: human-editable nested value.
    Toml,
    /// `.json`: human-editable nested value.
    Json,
    /// `.list`: one string per line, `#` comments.
    List,
    /// `.mpk`: MessagePack nested value.
    MessagePack,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(SourceFormat::Toml),
            "json" => Some(SourceFormat::Json),
            "list" => Some(SourceFormat::List),
            "mpk" => Some(SourceFormat::MessagePack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Toml => "toml",
            SourceFormat::Json => "json",
            SourceFormat::List => "list",
            SourceFormat::MessagePack => "mpk",
        }
    }

    /// Parse raw file content.
    pub fn parse(&self, bytes: &[u8]) -> Result<Value, String> {
        match self {
            SourceFormat::Toml => {
                let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
                toml::from_str::<Value>(text).map_err(|e| e.to_string())
            }
            SourceFormat::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            SourceFormat::List => {
                let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
                Ok(Value::Array(
                    text.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty() && !line.starts_with('#'))
                        .map(|line| Value::String(line.to_string()))
                        .collect(),
                ))
            }
            SourceFormat::MessagePack => rmp_serde::from_slice(bytes).map_err(|e| e.to_string()),
        }
    }

    /// Render a dictionary back into this format.
    pub fn render_dictionary(&self, map: &Map<String, Value>) -> Result<Vec<u8>, String> {
        match self {
            SourceFormat::Toml => toml::to_string(map)
                .map(String::into_bytes)
                .map_err(|e| e.to_string()),
            SourceFormat::Json => {
                let mut bytes = serde_json::to_vec_pretty(map).map_err(|e| e.to_string())?;
                bytes.push(b'\n');
                Ok(bytes)
            }
            SourceFormat::MessagePack => rmp_serde::to_vec(map).map_err(|e| e.to_string()),
            SourceFormat::List => Err("a list file cannot hold a dictionary".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("a/farms.toml")), Some(SourceFormat::Toml));
        assert_eq!(SourceFormat::from_path(Path::new("wikis.list")), Some(SourceFormat::List));
        assert_eq!(SourceFormat::from_path(Path::new("x.mpk")), Some(SourceFormat::MessagePack));
        assert_eq!(SourceFormat::from_path(Path::new("x.yml")), None);
        assert_eq!(SourceFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_list_skips_comments_and_blanks() {
        let value = SourceFormat::List.parse(b"# tenants\nen\n\n  fr  \n").unwrap();
        assert_eq!(value, json!(["en", "fr"]));
    }

    #[test]
    fn test_toml_keeps_key_order() {
        let value = SourceFormat::Toml.parse(b"zeta = 1\nalpha = 2\n").unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_broken_json_is_not_parseable() {
        assert!(SourceFormat::Json.parse(b"{ \"a\": ").is_err());
    }

    #[test]
    fn test_msgpack_dictionary_round_trip() {
        let map = json!({"enwiki": "1.2", "frwiki": "1.3"});
        let bytes = SourceFormat::MessagePack
            .render_dictionary(map.as_object().unwrap())
            .unwrap();
        assert_eq!(SourceFormat::MessagePack.parse(&bytes).unwrap(), map);
    }
}
