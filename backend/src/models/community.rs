use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const MIN_POST_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityPost {
    pub id: String,
    pub author: String,
    #[serde(default)]
    pub player_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 80))]
    pub author: String,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    pub player_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommunityQuery {
    pub search: Option<String>,
}
