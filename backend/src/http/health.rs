use actix_web::{web, HttpResponse, Result};
use chrono::Utc;

use crate::api_error::ApiError;
use crate::state::AppState;

/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    crate::db::health_check(&state.store).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "service": "tennis-league",
        "now": Utc::now(),
        "default_season": state.default_season,
        "store": "ok"
    })))
}
