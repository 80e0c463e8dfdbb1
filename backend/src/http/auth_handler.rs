use crate::api_error::ApiError;
use crate::auth::TokenExt;
use crate::models::{PhoneLoginRequest, RequestTacRequest, VerifyTacRequest};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;

/// POST /api/auth/request-tac
/// Issue a one-time code and deliver it over WhatsApp
pub async fn request_tac(
    state: web::Data<AppState>,
    request: web::Json<RequestTacRequest>,
) -> Result<impl Responder, ApiError> {
    let issued = state.tac.request_code(request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(issued))
}

/// POST /api/auth/verify-tac
/// Complete registration and open a session
pub async fn verify_tac(
    state: web::Data<AppState>,
    request: web::Json<VerifyTacRequest>,
) -> Result<impl Responder, ApiError> {
    let success = state.tac.verify_code(request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(success))
}

/// POST /api/auth/login-by-phone
/// Sign in a player who already completed registration
pub async fn login_by_phone(
    state: web::Data<AppState>,
    request: web::Json<PhoneLoginRequest>,
) -> Result<impl Responder, ApiError> {
    let success = state.tac.login_by_phone(request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(success))
}

/// GET /api/auth/session
/// Resolve the bearer token to its session and player
pub async fn current_session(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let token = req
        .bearer_token()
        .ok_or_else(|| ApiError::unauthorized("Missing or invalid Authorization header"))?;

    let active = state.sessions.resolve(token)?;

    Ok(HttpResponse::Ok().json(active))
}

/// POST /api/auth/logout
pub async fn logout(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let token = req
        .bearer_token()
        .ok_or_else(|| ApiError::unauthorized("Missing or invalid Authorization header"))?;

    let revoked = state.sessions.revoke(token).await?;
    info!(revoked, "Logout request handled");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

/// Configure authentication routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/request-tac", web::post().to(request_tac))
            .route("/verify-tac", web::post().to(verify_tac))
            .route("/login-by-phone", web::post().to(login_by_phone))
            .route("/session", web::get().to(current_session))
            .route("/logout", web::post().to(logout)),
    );
}
