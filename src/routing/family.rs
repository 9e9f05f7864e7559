//! Tenant family definitions.
//!
//! A family is one entry of the farms file. Only `server` is needed to
//! match; the rest is deserialized and validated once a request lands on
//! the family.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FarmError, FarmResult};

/// One pattern of tenants sharing a configuration shape.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FamilyDefinition {
    #[serde(skip)]
    pub name: String,

    /// Host pattern, optionally followed by `/` and a path pattern.
    pub server: String,

    /// Declared variables, in validation order.
    #[serde(default)]
    pub variables: Vec<VariableDeclaration>,

    pub suffix: Option<String>,

    pub identifier: Option<String>,

    /// Tenant → version dictionary.
    pub versions: Option<String>,

    /// Live tenant → version override dictionary.
    pub deployments: Option<String>,

    /// Ordered configuration sources.
    #[serde(default)]
    pub config: Vec<ConfigSourceDescriptor>,

    /// Rewritten host[/path] to re-match instead of resolving.
    pub redirect: Option<String>,

    pub data: Option<String>,

    pub cache: Option<String>,

    /// Page rendered when the tenant does not exist.
    pub not_found: Option<String>,
}

/// A per-tenant variable and where its legal values come from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VariableDeclaration {
    pub variable: String,

    /// Path template of a list or dictionary of legal values.
    pub file: Option<String>,

    /// Inline list or dictionary of legal values.
    pub values: Option<Value>,
}

impl VariableDeclaration {
    /// A variable with neither a file nor inline values only feeds templates.
    pub fn is_advisory(&self) -> bool {
        self.file.is_none() && self.values.is_none()
    }
}

/// One configuration source of a family.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConfigSourceDescriptor {
    /// Path template of the source.
    pub file: String,

    /// Literal key or wildcard pattern selecting what applies to a tenant.
    pub key: Option<String>,

    /// Literal compared with the suffix to promote `default` entries.
    pub default: Option<String>,

    /// Executed by the host rather than merged.
    #[serde(default)]
    pub executable: bool,
}

/// What a validated family does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyRole<'a> {
    Redirect(&'a str),
    Tenant { suffix: &'a str, identifier: &'a str },
}

impl FamilyDefinition {
    /// Deserialize a family from its farms-file entry.
    pub fn from_value(name: &str, value: &Value) -> FarmResult<Self> {
        let mut family: FamilyDefinition =
            serde_json::from_value(value.clone()).map_err(|e| FarmError::InvalidFamily {
                family: name.to_string(),
                reason: e.to_string(),
            })?;
        family.name = name.to_string();
        family.role()?;
        Ok(family)
    }

    /// Check the redirect / tenant invariant and return the role.
    pub fn role(&self) -> FarmResult<FamilyRole<'_>> {
        match (&self.redirect, &self.suffix, &self.identifier) {
            (Some(target), None, None) => Ok(FamilyRole::Redirect(target)),
            (Some(_), _, _) => Err(FarmError::InvalidFamily {
                family: self.name.clone(),
                reason: "a redirecting family cannot also declare suffix or identifier".to_string(),
            }),
            (None, Some(suffix), Some(identifier)) => {
                if let Some(source) = self.config.iter().find(|c| !c.executable && c.key.is_none()) {
                    return Err(FarmError::MissingKey {
                        family: self.name.clone(),
                        key: format!("config[{}].key", source.file),
                    });
                }
                Ok(FamilyRole::Tenant { suffix, identifier })
            }
            (None, None, _) => Err(self.missing("suffix")),
            (None, Some(_), None) => Err(self.missing("identifier")),
        }
    }

    fn missing(&self, key: &str) -> FarmError {
        FarmError::MissingKey {
            family: self.name.clone(),
            key: key.to_string(),
        }
    }
}
