use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::match_model::MatchView;
use super::profile::ProfileFields;

/// League skill group, derived from a player's NTRP rating unless set by an admin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkillGroup {
    D1,
    D2,
    D3,
    D4,
    D5,
}

impl SkillGroup {
    pub fn from_ntrp(ntrp: &str) -> Self {
        match ntrp.trim().parse::<f32>() {
            Ok(score) if score >= 4.5 => SkillGroup::D1,
            Ok(score) if score >= 4.0 => SkillGroup::D2,
            Ok(score) if score >= 3.5 => SkillGroup::D3,
            Ok(score) if score >= 3.0 => SkillGroup::D4,
            _ => SkillGroup::D5,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "D1" => Some(SkillGroup::D1),
            "D2" => Some(SkillGroup::D2),
            "D3" => Some(SkillGroup::D3),
            "D4" => Some(SkillGroup::D4),
            "D5" => Some(SkillGroup::D5),
            _ => None,
        }
    }
}

impl std::fmt::Display for SkillGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkillGroup::D1 => write!(f, "D1"),
            SkillGroup::D2 => write!(f, "D2"),
            SkillGroup::D3 => write!(f, "D3"),
            SkillGroup::D4 => write!(f, "D4"),
            SkillGroup::D5 => write!(f, "D5"),
        }
    }
}

/// NTRP ratings run from 1.0 to 7.0 in half steps; anything numeric in range is accepted.
pub fn is_valid_ntrp(value: &str) -> bool {
    value
        .trim()
        .parse::<f32>()
        .map(|score| (1.0..=7.0).contains(&score))
        .unwrap_or(false)
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub ntrp: String,
    pub group: SkillGroup,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub whatsapp_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile: ProfileFields,
    #[serde(default)]
    pub registered_via_whatsapp: bool,
    #[serde(default)]
    pub tac_verified: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Played/won/lost over a player's completed matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub played: u32,
    pub won: u32,
    pub lost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePlayerRequest {
    #[validate(length(min = 1, max = 80))]
    pub display_name: String,
    pub ntrp: Option<String>,
    pub group: Option<String>,
    pub country_code: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 120))]
    pub email: Option<String>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    pub profile: Option<ProfileFields>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePlayerRequest {
    #[validate(length(min = 1, max = 80))]
    pub display_name: Option<String>,
    pub ntrp: Option<String>,
    pub group: Option<String>,
    pub country_code: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 120))]
    pub email: Option<String>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    pub profile: Option<ProfileFields>,
    pub active: Option<bool>,
}

/// Self-service profile edit; a subset of the admin update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 80))]
    pub display_name: Option<String>,
    pub ntrp: Option<String>,
    pub group: Option<String>,
    #[validate(length(max = 120))]
    pub email: Option<String>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    pub profile: Option<ProfileFields>,
}

impl From<UpdateProfileRequest> for UpdatePlayerRequest {
    fn from(request: UpdateProfileRequest) -> Self {
        UpdatePlayerRequest {
            display_name: request.display_name,
            ntrp: request.ntrp,
            group: request.group,
            email: request.email,
            bio: request.bio,
            profile: request.profile,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerQuery {
    pub group: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhoneLookupQuery {
    pub phone: String,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerDetail {
    pub player: Player,
    pub stats: PlayerStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileQuery {
    pub player_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub player: Player,
    pub stats: PlayerStats,
    pub recent_matches: Vec<MatchView>,
}
