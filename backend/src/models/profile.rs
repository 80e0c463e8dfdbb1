use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single free-form profile value.
///
/// Restricted to scalars so that profile data stays flat and serializes the
/// same way every time; arrays and objects are rejected at deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

pub type ProfileFields = BTreeMap<String, ProfileValue>;

pub const MAX_PROFILE_FIELDS: usize = 32;
pub const MAX_PROFILE_KEY_LEN: usize = 40;
pub const MAX_PROFILE_TEXT_LEN: usize = 500;

/// Check size limits on a profile patch. Returns a human-readable message on failure.
pub fn check_profile_fields(fields: &ProfileFields) -> Result<(), String> {
    if fields.len() > MAX_PROFILE_FIELDS {
        return Err(format!("Profile may hold at most {MAX_PROFILE_FIELDS} fields."));
    }
    for (key, value) in fields {
        if key.trim().is_empty() || key.len() > MAX_PROFILE_KEY_LEN {
            return Err(format!(
                "Profile keys must be 1 to {MAX_PROFILE_KEY_LEN} characters."
            ));
        }
        if let ProfileValue::Text(text) = value {
            if text.len() > MAX_PROFILE_TEXT_LEN {
                return Err(format!("Profile field '{key}' is too long."));
            }
        }
    }
    Ok(())
}
