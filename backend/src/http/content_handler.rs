use crate::api_error::ApiError;
use crate::models::{CommunityQuery, CreateNewsRequest, CreatePostRequest, NewsQuery};
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};

// =============================================================================
// NEWS
// =============================================================================

/// GET /api/news
pub async fn list_news(
    state: web::Data<AppState>,
    query: web::Query<NewsQuery>,
) -> Result<impl Responder, ApiError> {
    let news = state.content.list_news(&query);

    Ok(HttpResponse::Ok().json(serde_json::json!({ "news": news })))
}

/// POST /api/admin/news
pub async fn create_news(
    state: web::Data<AppState>,
    request: web::Json<CreateNewsRequest>,
) -> Result<impl Responder, ApiError> {
    let item = state.content.create_news(request.into_inner()).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "ok": true, "news": item })))
}

/// DELETE /api/admin/news/{id}
pub async fn delete_news(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    state.content.delete_news(&path).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

// =============================================================================
// COMMUNITY
// =============================================================================

/// GET /api/community
pub async fn list_posts(
    state: web::Data<AppState>,
    query: web::Query<CommunityQuery>,
) -> Result<impl Responder, ApiError> {
    let posts = state.content.list_posts(&query);

    Ok(HttpResponse::Ok().json(serde_json::json!({ "posts": posts })))
}

/// POST /api/community
pub async fn create_post(
    state: web::Data<AppState>,
    request: web::Json<CreatePostRequest>,
) -> Result<impl Responder, ApiError> {
    let post = state.content.create_post(request.into_inner()).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "ok": true, "post": post })))
}

/// DELETE /api/admin/community/{id}
pub async fn delete_post(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    state.content.delete_post(&path).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/news", web::get().to(list_news)).service(
        web::resource("/community")
            .route(web::get().to(list_posts))
            .route(web::post().to(create_post)),
    );
}

pub fn configure_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/news", web::post().to(create_news))
        .route("/news/{id}", web::delete().to(delete_news))
        .route("/community/{id}", web::delete().to(delete_post));
}
