use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::api_error::ApiError;
use crate::db::DocumentStore;
use crate::models::*;

/// League news and the community board.
pub struct ContentService {
    store: Arc<DocumentStore>,
}

impl ContentService {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    // =============================================================================
    // NEWS
    // =============================================================================

    pub fn list_news(&self, query: &NewsQuery) -> Vec<NewsItem> {
        let category = non_blank(query.category.as_deref())
            .filter(|c| !c.eq_ignore_ascii_case("all"))
            .map(|c| c.to_lowercase());
        let search = non_blank(query.search.as_deref()).map(|s| s.to_lowercase());

        let doc = self.store.snapshot();
        let mut items: Vec<NewsItem> = doc
            .news
            .values()
            .filter(|n| {
                category
                    .as_ref()
                    .map_or(true, |c| &n.category.to_lowercase() == c)
            })
            .filter(|n| {
                search.as_ref().map_or(true, |s| {
                    n.title.to_lowercase().contains(s) || n.content.to_lowercase().contains(s)
                })
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        items
    }

    pub async fn create_news(&self, request: CreateNewsRequest) -> Result<NewsItem, ApiError> {
        request.validate()?;
        let title = non_blank(Some(request.title.as_str()));
        let content = non_blank(Some(request.content.as_str()));
        let (Some(title), Some(content)) = (title, content) else {
            return Err(ApiError::validation("Title and content are required."));
        };

        let item = NewsItem {
            id: new_id("n"),
            title,
            category: non_blank(request.category.as_deref())
                .unwrap_or_else(|| DEFAULT_NEWS_CATEGORY.to_string()),
            content,
            image: non_blank(request.image.as_deref()).unwrap_or_default(),
            published_at: request.published_at.unwrap_or_else(Utc::now),
        };

        let item = self
            .store
            .with_transaction(|doc| {
                doc.news.insert(item.id.clone(), item.clone());
                Ok::<_, ApiError>(item)
            })
            .await?;

        info!(news_id = %item.id, category = %item.category, "News published");
        Ok(item)
    }

    pub async fn delete_news(&self, news_id: &str) -> Result<(), ApiError> {
        self.store
            .with_transaction(|doc| {
                doc.news
                    .remove(news_id)
                    .map(|_| ())
                    .ok_or_else(|| ApiError::not_found("News post not found."))
            })
            .await?;

        info!(news_id = %news_id, "News deleted");
        Ok(())
    }

    // =============================================================================
    // COMMUNITY
    // =============================================================================

    pub fn list_posts(&self, query: &CommunityQuery) -> Vec<CommunityPost> {
        let search = non_blank(query.search.as_deref()).map(|s| s.to_lowercase());

        let doc = self.store.snapshot();
        let mut posts: Vec<CommunityPost> = doc
            .community
            .values()
            .filter(|p| {
                search.as_ref().map_or(true, |s| {
                    p.author.to_lowercase().contains(s) || p.content.to_lowercase().contains(s)
                })
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        posts
    }

    pub async fn create_post(&self, request: CreatePostRequest) -> Result<CommunityPost, ApiError> {
        request.validate()?;
        let author = non_blank(Some(request.author.as_str()))
            .ok_or_else(|| ApiError::validation("Author is required."))?;
        let content = request.content.trim().to_string();
        if content.chars().count() < MIN_POST_LEN {
            return Err(ApiError::validation("Community post is too short."));
        }
        let player_id = non_blank(request.player_id.as_deref());

        let post = self
            .store
            .with_transaction(|doc| {
                if let Some(id) = &player_id {
                    if !doc.players.contains_key(id) {
                        return Err(ApiError::validation(format!("Invalid player ID '{id}'.")));
                    }
                }
                let post = CommunityPost {
                    id: new_id("c"),
                    author,
                    player_id,
                    content,
                    created_at: Utc::now(),
                };
                doc.community.insert(post.id.clone(), post.clone());
                Ok(post)
            })
            .await?;

        info!(post_id = %post.id, "Community post created");
        Ok(post)
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.store
            .with_transaction(|doc| {
                doc.community
                    .remove(post_id)
                    .map(|_| ())
                    .ok_or_else(|| ApiError::not_found("Community post not found."))
            })
            .await?;

        info!(post_id = %post_id, "Community post deleted");
        Ok(())
    }
}
