use crate::api_error::ApiError;
use crate::service::dashboard;
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;

/// GET /api/admin/dashboard
/// Collection counts for the admin console
pub async fn get_dashboard(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let summary = dashboard(&state.store.snapshot(), Utc::now());

    Ok(HttpResponse::Ok().json(summary))
}

pub fn configure_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/dashboard", web::get().to(get_dashboard));
}
