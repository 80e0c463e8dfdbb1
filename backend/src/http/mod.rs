// HTTP handlers, one module per resource
pub mod admin_handler;
pub mod auth_handler;
pub mod content_handler;
pub mod health;
pub mod match_handler;
pub mod player_handler;
pub mod tournament_handler;
