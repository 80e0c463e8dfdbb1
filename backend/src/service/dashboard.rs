use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Document, MatchStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardCounts {
    pub players: usize,
    pub active_players: usize,
    pub verified_players: usize,
    pub matches: usize,
    pub completed_matches: usize,
    pub tournament_matches: usize,
    pub news: usize,
    pub community_posts: usize,
    pub pending_challenges: usize,
    pub live_sessions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub counts: DashboardCounts,
    pub generated_at: DateTime<Utc>,
}

pub fn dashboard(doc: &Document, now: DateTime<Utc>) -> Dashboard {
    let counts = DashboardCounts {
        players: doc.players.len(),
        active_players: doc.players.values().filter(|p| p.active).count(),
        verified_players: doc.players.values().filter(|p| p.tac_verified).count(),
        matches: doc.matches.len(),
        completed_matches: doc
            .matches
            .values()
            .filter(|m| m.status == MatchStatus::Completed)
            .count(),
        tournament_matches: doc.tournament_matches.len(),
        news: doc.news.len(),
        community_posts: doc.community.len(),
        pending_challenges: doc.tac_challenges.values().filter(|c| c.is_active(now)).count(),
        live_sessions: doc.sessions.values().filter(|s| !s.is_expired(now)).count(),
    };

    Dashboard {
        counts,
        generated_at: now,
    }
}
