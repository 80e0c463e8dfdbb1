use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const REGULAR_STAGE: &str = "REGULAR";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Scheduled => write!(f, "scheduled"),
            MatchStatus::Completed => write!(f, "completed"),
            MatchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchOrigin {
    Admin,
    Player,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub season: String,
    pub stage: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub player_a_id: String,
    pub player_b_id: String,
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub winner_id: Option<String>,
    pub status: MatchStatus,
    pub created_by: MatchOrigin,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn involves(&self, player_id: &str) -> bool {
        self.player_a_id == player_id || self.player_b_id == player_id
    }

    pub fn loser_id(&self) -> Option<&str> {
        let winner = self.winner_id.as_deref()?;
        if winner == self.player_a_id {
            Some(&self.player_b_id)
        } else if winner == self.player_b_id {
            Some(&self.player_a_id)
        } else {
            None
        }
    }
}

/// Create or replace a match. On update, absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct MatchRequest {
    #[validate(length(max = 40))]
    pub season: Option<String>,
    #[validate(length(max = 20))]
    pub stage: Option<String>,
    pub date: Option<NaiveDate>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub player_a_id: Option<String>,
    pub player_b_id: Option<String>,
    #[validate(length(max = 60))]
    pub score: Option<String>,
    pub winner_id: Option<String>,
    pub status: Option<MatchStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchQuery {
    pub season: Option<String>,
    pub stage: Option<String>,
}

/// A match with the display names of everyone it references.
#[derive(Debug, Clone, Serialize)]
pub struct MatchView {
    #[serde(flatten)]
    pub match_data: Match,
    pub player_a_name: String,
    pub player_b_name: String,
    pub winner_name: String,
    pub loser_name: String,
}

/// Games won by each side in one set, e.g. `6-4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetScore {
    pub a: u32,
    pub b: u32,
}

/// Upper bound on games in one set; covers long advantage sets and match tiebreaks.
pub const MAX_GAMES_PER_SET: u32 = 99;

/// Parse `"6-4, 3-6, 7-5"` (`:` is also accepted as a separator).
pub fn parse_score(score: &str) -> Result<Vec<SetScore>, String> {
    let mut sets = Vec::new();
    for part in score.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (a, b) = part
            .split_once(['-', ':'])
            .ok_or_else(|| format!("Invalid set score '{part}'."))?;
        let a = a
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid set score '{part}'."))?;
        let b = b
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid set score '{part}'."))?;
        if a > MAX_GAMES_PER_SET || b > MAX_GAMES_PER_SET {
            return Err(format!(
                "Set score '{part}' exceeds {MAX_GAMES_PER_SET} games per side."
            ));
        }
        sets.push(SetScore { a, b });
    }
    Ok(sets)
}

/// Which side took more sets, if either.
pub fn winning_side(sets: &[SetScore]) -> Option<Side> {
    let won_a = sets.iter().filter(|s| s.a > s.b).count();
    let won_b = sets.iter().filter(|s| s.b > s.a).count();
    match won_a.cmp(&won_b) {
        std::cmp::Ordering::Greater => Some(Side::A),
        std::cmp::Ordering::Less => Some(Side::B),
        std::cmp::Ordering::Equal => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}
