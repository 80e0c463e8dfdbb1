use actix_cors::Cors;
use actix_web::http::header;

use crate::auth::ADMIN_TOKEN_HEADER;

pub fn cors_middleware() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allowed_header(ADMIN_TOKEN_HEADER)
        .max_age(3600)
}
