// Core models
pub mod community;
pub mod delivery;
pub mod document;
pub mod match_model;
pub mod news;
pub mod phone;
pub mod player;
pub mod profile;
pub mod session;
pub mod tac;
pub mod tournament;

// Re-export commonly used types
pub use community::*;
pub use delivery::*;
pub use document::*;
pub use match_model::*;
pub use news::*;
pub use phone::*;
pub use player::*;
pub use profile::*;
pub use session::*;
pub use tac::*;
pub use tournament::*;

use uuid::Uuid;

/// Generate a short collection-scoped id such as `p_1f3a9c0d2b`.
pub fn new_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..10])
}

/// Trim a string field, mapping blank input to `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
