//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that required directories are set
//! - Validate value ranges (redirect budget > 0)
//! - Check component layout templates
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::EngineConfig;

/// A single semantic problem found in an [`EngineConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate an engine configuration, collecting every problem.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.paths.config_dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("paths.config_dir", "must be set"));
    }
    if config.paths.farms_file.as_os_str().is_empty() {
        errors.push(ValidationError::new("paths.farms_file", "must be set"));
    }
    if config.paths.code_root.is_some() && config.paths.code_dir.is_some() {
        errors.push(ValidationError::new(
            "paths.code_dir",
            "cannot be combined with paths.code_root",
        ));
    }
    if config.routing.max_redirects == 0 {
        errors.push(ValidationError::new(
            "routing.max_redirects",
            "must be at least 1",
        ));
    }

    let layout = &config.components;
    if !layout.inline_entry.contains("$NAME") {
        errors.push(ValidationError::new(
            "components.inline_entry",
            "must contain the $NAME placeholder",
        ));
    }
    for (field, value) in [
        ("components.extensions_dir", &layout.extensions_dir),
        ("components.skins_dir", &layout.skins_dir),
        ("components.extension_manifest", &layout.extension_manifest),
        ("components.skin_manifest", &layout.skin_manifest),
        ("components.package_manifest", &layout.package_manifest),
        ("components.vendor_dir", &layout.vendor_dir),
        ("components.dependency_manifest", &layout.dependency_manifest),
        ("components.installation_marker", &layout.installation_marker),
        ("components.self_component", &layout.self_component),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_with_config_dir_is_valid() {
        let config = EngineConfig::with_config_dir("/srv/farm");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = EngineConfig::default();
        config.routing.max_redirects = 0;
        config.components.inline_entry = "entry.php".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"paths.config_dir"));
        assert!(fields.contains(&"routing.max_redirects"));
        assert!(fields.contains(&"components.inline_entry"));
    }
}
