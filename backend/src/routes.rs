use actix_web::{error, web, HttpRequest, HttpResponse};

use crate::api_error::ApiError;
use crate::auth::AdminGuard;
use crate::http::{
    admin_handler, auth_handler, content_handler, health, match_handler, player_handler,
    tournament_handler,
};

/// Mount the whole `/api` surface. Expects `web::Data<AppState>` on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(
            web::scope("/api")
                .route("/health", web::get().to(health::health_check))
                .configure(auth_handler::configure_routes)
                .configure(player_handler::configure_routes)
                .configure(match_handler::configure_routes)
                .configure(tournament_handler::configure_routes)
                .configure(content_handler::configure_routes)
                .service(
                    web::scope("/admin")
                        .wrap(AdminGuard)
                        .configure(admin_handler::configure_admin_routes)
                        .configure(player_handler::configure_admin_routes)
                        .configure(match_handler::configure_admin_routes)
                        .configure(content_handler::configure_admin_routes)
                        .configure(tournament_handler::configure_admin_routes),
                )
                .default_service(web::to(route_not_found)),
        );
}

async fn route_not_found(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    Err(ApiError::not_found(format!("No route for {} {}", req.method(), req.path())))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| ApiError::validation(format!("Invalid JSON body: {err}")).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: error::QueryPayloadError, _req| {
        ApiError::validation(format!("Invalid query string: {err}")).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err: error::PathError, _req| {
        ApiError::validation(format!("Invalid path: {err}")).into()
    })
}
