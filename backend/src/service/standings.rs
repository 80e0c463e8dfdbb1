use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{
    parse_score, Document, MatchStatus, PlayerStats, SkillGroup, REGULAR_STAGE,
};

pub const WIN_POINTS: u32 = 3;
/// Awarded for playing, even in a loss.
pub const LOSS_POINTS: u32 = 1;

/// One row of the league table. Derived on read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingsEntry {
    pub rank: u32,
    pub player_id: String,
    pub name: String,
    pub group: Option<SkillGroup>,
    pub ntrp: String,
    pub played: u32,
    pub won: u32,
    pub lost: u32,
    pub sets_won: u32,
    pub sets_lost: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub points: u32,
}

impl StandingsEntry {
    fn new(player_id: &str, doc: &Document) -> Self {
        let player = doc.players.get(player_id);
        Self {
            rank: 0,
            player_id: player_id.to_string(),
            name: player
                .map(|p| p.display_name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            group: player.map(|p| p.group),
            ntrp: player.map(|p| p.ntrp.clone()).unwrap_or_default(),
            played: 0,
            won: 0,
            lost: 0,
            sets_won: 0,
            sets_lost: 0,
            games_won: 0,
            games_lost: 0,
            points: 0,
        }
    }

    pub fn set_difference(&self) -> i64 {
        i64::from(self.sets_won) - i64::from(self.sets_lost)
    }

    pub fn game_difference(&self) -> i64 {
        i64::from(self.games_won) - i64::from(self.games_lost)
    }

    fn record(&mut self, won: bool, sets: (u32, u32), games: (u32, u32)) {
        self.played = self.played.saturating_add(1);
        if won {
            self.won = self.won.saturating_add(1);
            self.points = self.points.saturating_add(WIN_POINTS);
        } else {
            self.lost = self.lost.saturating_add(1);
            self.points = self.points.saturating_add(LOSS_POINTS);
        }
        self.sets_won = self.sets_won.saturating_add(sets.0);
        self.sets_lost = self.sets_lost.saturating_add(sets.1);
        self.games_won = self.games_won.saturating_add(games.0);
        self.games_lost = self.games_lost.saturating_add(games.1);
    }
}

fn table_order(a: &StandingsEntry, b: &StandingsEntry) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.set_difference().cmp(&a.set_difference()))
        .then_with(|| b.game_difference().cmp(&a.game_difference()))
        .then_with(|| b.won.cmp(&a.won))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

/// Fold the completed regular-season matches of `season` into a ranked table.
///
/// Only players who appear in a counted match get a row. `group` keeps rows
/// whose player is currently in that skill group; ranks are assigned after
/// filtering.
pub fn compute_standings(
    doc: &Document,
    season: &str,
    group: Option<SkillGroup>,
) -> Vec<StandingsEntry> {
    let mut table: HashMap<&str, StandingsEntry> = HashMap::new();

    for m in doc.matches.values() {
        if m.season != season || m.stage != REGULAR_STAGE || m.status != MatchStatus::Completed {
            continue;
        }
        let Some(winner) = m.winner_id.as_deref() else {
            continue;
        };
        if !m.involves(winner) {
            continue;
        }

        let sets = parse_score(&m.score).unwrap_or_default();
        let sets_a = sets.iter().filter(|s| s.a > s.b).count() as u32;
        let sets_b = sets.iter().filter(|s| s.b > s.a).count() as u32;
        let games_a = sets.iter().fold(0u32, |acc, s| acc.saturating_add(s.a));
        let games_b = sets.iter().fold(0u32, |acc, s| acc.saturating_add(s.b));
        let a_won = winner == m.player_a_id;

        table
            .entry(m.player_a_id.as_str())
            .or_insert_with(|| StandingsEntry::new(&m.player_a_id, doc))
            .record(a_won, (sets_a, sets_b), (games_a, games_b));
        table
            .entry(m.player_b_id.as_str())
            .or_insert_with(|| StandingsEntry::new(&m.player_b_id, doc))
            .record(!a_won, (sets_b, sets_a), (games_b, games_a));
    }

    let mut rows: Vec<StandingsEntry> = table
        .into_values()
        .filter(|row| group.is_none() || row.group == group)
        .collect();
    rows.sort_by(table_order);
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i as u32 + 1;
    }
    rows
}

/// Played/won/lost over every completed match of the player, any season or stage.
pub fn player_stats(doc: &Document, player_id: &str) -> PlayerStats {
    let mut stats = PlayerStats::default();
    for m in doc
        .matches
        .values()
        .filter(|m| m.status == MatchStatus::Completed && m.involves(player_id))
    {
        stats.played += 1;
        if m.winner_id.as_deref() == Some(player_id) {
            stats.won += 1;
        } else {
            stats.lost += 1;
        }
    }
    stats
}
