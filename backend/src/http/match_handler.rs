use crate::api_error::ApiError;
use crate::models::{non_blank, MatchOrigin, MatchQuery, MatchRequest};
use crate::service::compute_standings;
use crate::service::player_service::parse_group_filter;
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct StandingsQuery {
    pub season: Option<String>,
    pub group: Option<String>,
}

/// GET /api/matches
pub async fn list_matches(
    state: web::Data<AppState>,
    query: web::Query<MatchQuery>,
) -> Result<impl Responder, ApiError> {
    let matches = state.matches.list(&query);

    Ok(HttpResponse::Ok().json(serde_json::json!({ "matches": matches })))
}

/// POST /api/matches
/// Report a match from the player app
pub async fn report_match(
    state: web::Data<AppState>,
    request: web::Json<MatchRequest>,
) -> Result<impl Responder, ApiError> {
    let view = state
        .matches
        .create(request.into_inner(), MatchOrigin::Player)
        .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "ok": true, "match": view })))
}

/// GET /api/standings
pub async fn standings(
    state: web::Data<AppState>,
    query: web::Query<StandingsQuery>,
) -> Result<impl Responder, ApiError> {
    let season = non_blank(query.season.as_deref())
        .unwrap_or_else(|| state.matches.default_season().to_string());
    let group = parse_group_filter(query.group.as_deref())?;

    let rows = compute_standings(&state.store.snapshot(), &season, group);
    let group = group.map_or_else(|| "ALL".to_string(), |g| g.to_string());

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "season": season,
        "group": group,
        "rows": rows
    })))
}

// =============================================================================
// ADMIN
// =============================================================================

/// POST /api/admin/matches
pub async fn create_match(
    state: web::Data<AppState>,
    request: web::Json<MatchRequest>,
) -> Result<impl Responder, ApiError> {
    let view = state
        .matches
        .create(request.into_inner(), MatchOrigin::Admin)
        .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "ok": true, "match": view })))
}

/// PUT /api/admin/matches/{id}
pub async fn update_match(
    state: web::Data<AppState>,
    path: web::Path<String>,
    request: web::Json<MatchRequest>,
) -> Result<impl Responder, ApiError> {
    let view = state.matches.update(&path, request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true, "match": view })))
}

/// DELETE /api/admin/matches/{id}
pub async fn delete_match(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    state.matches.delete(&path).await?;
    info!(match_id = %path, "Admin deleted match");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/matches")
            .route(web::get().to(list_matches))
            .route(web::post().to(report_match)),
    )
    .route("/standings", web::get().to(standings));
}

pub fn configure_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/matches", web::post().to(create_match)).service(
        web::resource("/matches/{id}")
            .route(web::put().to(update_match))
            .route(web::delete().to(delete_match)),
    );
}
