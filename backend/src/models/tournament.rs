use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Single-elimination rounds, earliest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Round {
    R32,
    R16,
    QF,
    SF,
    F,
}

impl Round {
    pub const ALL: [Round; 5] = [Round::R32, Round::R16, Round::QF, Round::SF, Round::F];

    /// 1-based round number.
    pub fn number(self) -> u8 {
        match self {
            Round::R32 => 1,
            Round::R16 => 2,
            Round::QF => 3,
            Round::SF => 4,
            Round::F => 5,
        }
    }

    pub fn match_count(self) -> u32 {
        match self {
            Round::R32 => 16,
            Round::R16 => 8,
            Round::QF => 4,
            Round::SF => 2,
            Round::F => 1,
        }
    }

    pub fn next(self) -> Option<Round> {
        match self {
            Round::R32 => Some(Round::R16),
            Round::R16 => Some(Round::QF),
            Round::QF => Some(Round::SF),
            Round::SF => Some(Round::F),
            Round::F => None,
        }
    }

    pub fn previous(self) -> Option<Round> {
        match self {
            Round::R32 => None,
            Round::R16 => Some(Round::R32),
            Round::QF => Some(Round::R16),
            Round::SF => Some(Round::QF),
            Round::F => Some(Round::SF),
        }
    }

    pub fn parse(value: &str) -> Option<Round> {
        match value.trim().to_ascii_uppercase().as_str() {
            "R32" => Some(Round::R32),
            "R16" => Some(Round::R16),
            "QF" => Some(Round::QF),
            "SF" => Some(Round::SF),
            "F" => Some(Round::F),
            _ => None,
        }
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Round::R32 => write!(f, "R32"),
            Round::R16 => write!(f, "R16"),
            Round::QF => write!(f, "QF"),
            Round::SF => write!(f, "SF"),
            Round::F => write!(f, "F"),
        }
    }
}

/// Which of the two slots of a match a player occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSide {
    Player1,
    Player2,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BracketStatus {
    /// At least one slot is still TBD.
    Pending,
    /// Both slots filled, no result yet.
    Ready,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentMatch {
    pub id: String,
    pub season: String,
    pub round: Round,
    pub slot: u32,
    #[serde(default)]
    pub player1_id: Option<String>,
    #[serde(default)]
    pub player2_id: Option<String>,
    #[serde(default)]
    pub winner_id: Option<String>,
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TournamentMatch {
    pub fn status(&self) -> BracketStatus {
        if self.winner_id.is_some() {
            BracketStatus::Completed
        } else if self.player1_id.is_some() && self.player2_id.is_some() {
            BracketStatus::Ready
        } else {
            BracketStatus::Pending
        }
    }

    pub fn slot_player(&self, side: SlotSide) -> Option<&str> {
        match side {
            SlotSide::Player1 => self.player1_id.as_deref(),
            SlotSide::Player2 => self.player2_id.as_deref(),
        }
    }

    pub fn set_slot_player(&mut self, side: SlotSide, player_id: Option<String>) {
        match side {
            SlotSide::Player1 => self.player1_id = player_id,
            SlotSide::Player2 => self.player2_id = player_id,
        }
    }

    /// The slot in the next round that this match's winner moves into.
    pub fn next_position(&self) -> Option<(Round, u32, SlotSide)> {
        let next = self.round.next()?;
        let side = if self.slot % 2 == 0 {
            SlotSide::Player1
        } else {
            SlotSide::Player2
        };
        Some((next, self.slot / 2, side))
    }

    /// The previous-round position that feeds `side` of this match.
    pub fn feeder_position(&self, side: SlotSide) -> Option<(Round, u32)> {
        let previous = self.round.previous()?;
        let slot = match side {
            SlotSide::Player1 => self.slot * 2,
            SlotSide::Player2 => self.slot * 2 + 1,
        };
        Some((previous, slot))
    }
}

/// Record (create or update) the match at `(season, round, slot)`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordTournamentMatchRequest {
    #[validate(length(min = 1, max = 40))]
    pub season: String,
    pub round: String,
    pub slot: u32,
    pub player1_id: Option<String>,
    pub player2_id: Option<String>,
    pub winner_id: Option<String>,
    #[validate(length(max = 60))]
    pub score: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    #[serde(rename = "match")]
    pub recorded: TournamentMatch,
    pub advanced_to: Option<TournamentMatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TournamentQuery {
    pub season: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TournamentMatchView {
    #[serde(flatten)]
    pub match_data: TournamentMatch,
    pub round_number: u8,
    pub status: BracketStatus,
    pub player1_name: String,
    pub player2_name: String,
    pub winner_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BracketView {
    pub season: String,
    pub matches: Vec<TournamentMatchView>,
}
