use crate::api_error::ApiError;
use crate::models::{RecordTournamentMatchRequest, TournamentQuery};
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};

/// GET /api/tournament
/// Bracket for a season, ordered by round then slot
pub async fn bracket(
    state: web::Data<AppState>,
    query: web::Query<TournamentQuery>,
) -> Result<impl Responder, ApiError> {
    Ok(HttpResponse::Ok().json(state.tournament.bracket(&query)))
}

/// POST /api/admin/tournament/matches
/// Record a bracket result and advance the winner
pub async fn record_result(
    state: web::Data<AppState>,
    request: web::Json<RecordTournamentMatchRequest>,
) -> Result<impl Responder, ApiError> {
    let outcome = state.tournament.record_result(request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// DELETE /api/admin/tournament/matches/{id}
pub async fn delete_tournament_match(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    state.tournament.delete(&path).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/tournament", web::get().to(bracket));
}

pub fn configure_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/tournament/matches", web::post().to(record_result))
        .route(
            "/tournament/matches/{id}",
            web::delete().to(delete_tournament_match),
        );
}
