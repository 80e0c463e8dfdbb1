use crate::api_error::ApiError;
use crate::models::*;
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use tracing::info;

// =============================================================================
// PUBLIC
// =============================================================================

/// GET /api/players
pub async fn list_players(
    state: web::Data<AppState>,
    query: web::Query<PlayerQuery>,
) -> Result<impl Responder, ApiError> {
    let players = state.players.list(&query)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "players": players })))
}

/// GET /api/players/by-phone
pub async fn find_by_phone(
    state: web::Data<AppState>,
    query: web::Query<PhoneLookupQuery>,
) -> Result<impl Responder, ApiError> {
    let player = state.players.find_by_phone(&query)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "player": player })))
}

/// GET /api/players/{id}
/// Player with their match record
pub async fn get_player(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    let detail = state.players.get(&path)?;

    Ok(HttpResponse::Ok().json(detail))
}

/// GET /api/profile?player_id=
pub async fn get_profile(
    state: web::Data<AppState>,
    query: web::Query<ProfileQuery>,
) -> Result<impl Responder, ApiError> {
    let profile = state.players.profile(&query)?;

    Ok(HttpResponse::Ok().json(profile))
}

/// PUT /api/profile/{player_id}
pub async fn update_profile(
    state: web::Data<AppState>,
    path: web::Path<String>,
    request: web::Json<UpdateProfileRequest>,
) -> Result<impl Responder, ApiError> {
    let player = state
        .players
        .update_profile(&path, request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true, "player": player })))
}

// =============================================================================
// ADMIN
// =============================================================================

/// POST /api/admin/players
pub async fn create_player(
    state: web::Data<AppState>,
    request: web::Json<CreatePlayerRequest>,
) -> Result<impl Responder, ApiError> {
    info!(display_name = %request.display_name, "Admin create player request");

    let player = state.players.create(request.into_inner()).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "ok": true, "player": player })))
}

/// PUT /api/admin/players/{id}
pub async fn update_player(
    state: web::Data<AppState>,
    path: web::Path<String>,
    request: web::Json<UpdatePlayerRequest>,
) -> Result<impl Responder, ApiError> {
    let player = state.players.update(&path, request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true, "player": player })))
}

/// DELETE /api/admin/players/{id}
pub async fn delete_player(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    state.players.delete(&path).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/players", web::get().to(list_players))
        .route("/players/by-phone", web::get().to(find_by_phone))
        .route("/players/{id}", web::get().to(get_player))
        .route("/profile", web::get().to(get_profile))
        .route("/profile/{player_id}", web::put().to(update_profile));
}

pub fn configure_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/players", web::post().to(create_player)).service(
        web::resource("/players/{id}")
            .route(web::put().to(update_player))
            .route(web::delete().to(delete_player)),
    );
}
