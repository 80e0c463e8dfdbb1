// Domain services for the league
pub mod content_service;
pub mod dashboard;
pub mod match_service;
pub mod player_service;
pub mod standings;
pub mod tac_service;
pub mod tournament_service;
pub mod whatsapp;

#[cfg(test)]
mod tac_service_test;

pub use content_service::ContentService;
pub use dashboard::{dashboard, Dashboard, DashboardCounts};
pub use match_service::MatchService;
pub use player_service::PlayerService;
pub use standings::{compute_standings, player_stats, StandingsEntry};
pub use tac_service::{SweepReport, TacAuthenticator};
pub use tournament_service::TournamentService;
pub use whatsapp::{sender_from_config, CodeSender, DeliveryError};
