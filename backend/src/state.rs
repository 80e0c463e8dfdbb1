use std::sync::Arc;

use crate::auth::{AdminGate, SessionService};
use crate::config::Config;
use crate::db::DocumentStore;
use crate::service::{
    CodeSender, ContentService, MatchService, PlayerService, TacAuthenticator, TournamentService,
};

/// Everything the handlers need, shared across workers as `web::Data<AppState>`.
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub players: PlayerService,
    pub matches: MatchService,
    pub tournament: TournamentService,
    pub content: ContentService,
    pub tac: TacAuthenticator,
    pub sessions: SessionService,
    pub admin_gate: AdminGate,
    pub default_season: String,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<DocumentStore>, sender: Arc<dyn CodeSender>) -> Self {
        let season = config.league.default_season.clone();
        let session_ttl = config.auth.session_ttl();

        Self {
            players: PlayerService::new(store.clone(), config.tac.default_country_code.clone()),
            matches: MatchService::new(store.clone(), season.clone()),
            tournament: TournamentService::new(store.clone(), season.clone()),
            content: ContentService::new(store.clone()),
            tac: TacAuthenticator::new(store.clone(), sender, config.tac.clone(), session_ttl),
            sessions: SessionService::new(store.clone(), session_ttl),
            admin_gate: AdminGate::new(&config.auth.admin_token),
            default_season: season,
            store,
        }
    }
}
