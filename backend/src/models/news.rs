use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_NEWS_CATEGORY: &str = "Official";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub category: String,
    pub content: String,
    #[serde(default)]
    pub image: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateNewsRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 40))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 20000))]
    pub content: String,
    #[validate(length(max = 500))]
    pub image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}
