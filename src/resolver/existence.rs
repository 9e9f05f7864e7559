//! Tenant existence tracking.
//!
//! # States
//! - Unknown: no variable source has spoken yet
//! - Affirmed: some variable source listed the tenant
//! - Denied: an identifier-bearing variable failed its lookup
//!
//! # State Transitions
//! ```text
//! Unknown → Affirmed: a source affirms membership
//! Unknown → Denied:   an identifier-bearing variable is not a member
//! Denied  → Affirmed: a later source affirms membership
//! Affirmed is final; it is never downgraded
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tri-state explicit existence of a tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Existence {
    #[default]
    Unknown,
    Affirmed,
    Denied,
}

impl Existence {
    pub fn affirm(&mut self) {
        *self = Existence::Affirmed;
    }

    pub fn deny(&mut self) {
        if *self != Existence::Affirmed {
            *self = Existence::Denied;
        }
    }

    pub fn is_explicit(&self) -> bool {
        *self == Existence::Affirmed
    }
}

/// Outcome of looking a variable value up in its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    /// Listed; `mapped` is the dictionary value when it is a string.
    Member { mapped: Option<String> },
    NotMember,
}

/// Look `value` up in a list (membership only) or dictionary (membership + mapped value).
///
/// Any other shape is an error message describing the problem.
pub fn check_membership(choices: &Value, value: &str) -> Result<Membership, String> {
    match choices {
        Value::Array(items) => {
            let found = items.iter().any(|item| match item {
                Value::String(s) => s == value,
                Value::Number(n) => n.to_string() == value,
                _ => false,
            });
            Ok(if found {
                Membership::Member { mapped: None }
            } else {
                Membership::NotMember
            })
        }
        Value::Object(map) => Ok(match map.get(value) {
            Some(mapped) => Membership::Member {
                mapped: mapped.as_str().map(str::to_string),
            },
            None => Membership::NotMember,
        }),
        _ => Err("expected a list or a dictionary of values".to_string()),
    }
}
