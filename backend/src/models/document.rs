use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::community::CommunityPost;
use super::match_model::Match;
use super::news::NewsItem;
use super::player::Player;
use super::session::Session;
use super::tac::TacChallenge;
use super::tournament::{Round, TournamentMatch};

/// The whole persisted state: every collection, keyed by id.
///
/// Missing keys deserialize to empty collections and every key is always
/// written back, so a stored document never lacks a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub players: BTreeMap<String, Player>,
    #[serde(default)]
    pub matches: BTreeMap<String, Match>,
    #[serde(default)]
    pub tournament_matches: BTreeMap<String, TournamentMatch>,
    #[serde(default)]
    pub news: BTreeMap<String, NewsItem>,
    #[serde(default)]
    pub community: BTreeMap<String, CommunityPost>,
    #[serde(default)]
    pub tac_challenges: BTreeMap<String, TacChallenge>,
    /// Keyed by token digest.
    #[serde(default)]
    pub sessions: BTreeMap<String, Session>,
}

impl Document {
    pub fn player_by_whatsapp(&self, whatsapp_number: &str) -> Option<&Player> {
        self.players
            .values()
            .find(|p| p.whatsapp_number == whatsapp_number)
    }

    /// Display name for a weak player reference.
    pub fn player_name(&self, player_id: Option<&str>, missing: &str) -> String {
        player_id
            .and_then(|id| self.players.get(id))
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| missing.to_string())
    }

    pub fn tournament_match_at(
        &self,
        season: &str,
        round: Round,
        slot: u32,
    ) -> Option<&TournamentMatch> {
        self.tournament_matches
            .values()
            .find(|m| m.season == season && m.round == round && m.slot == slot)
    }

    pub fn tournament_match_at_mut(
        &mut self,
        season: &str,
        round: Round,
        slot: u32,
    ) -> Option<&mut TournamentMatch> {
        self.tournament_matches
            .values_mut()
            .find(|m| m.season == season && m.round == round && m.slot == slot)
    }
}
