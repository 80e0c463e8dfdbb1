use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::delivery::DeliveryReport;
use super::player::Player;
use super::session::IssuedSession;

/// Lifecycle of a TAC challenge. Only `Issued` is live; every other state is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TacState {
    Issued,
    Consumed,
    Expired,
    /// Replaced by a newer request for the same phone.
    Superseded,
    /// Too many wrong codes.
    Locked,
}

impl TacState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TacState::Issued)
    }

    /// Every transition leaves `Issued`; terminal states never change again.
    pub fn can_transition_to(&self, next: &TacState) -> bool {
        matches!(self, TacState::Issued) && next.is_terminal()
    }
}

impl std::fmt::Display for TacState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TacState::Issued => write!(f, "issued"),
            TacState::Consumed => write!(f, "consumed"),
            TacState::Expired => write!(f, "expired"),
            TacState::Superseded => write!(f, "superseded"),
            TacState::Locked => write!(f, "locked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacChallenge {
    pub id: String,
    pub country_code: String,
    pub phone: String,
    pub whatsapp_number: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub ntrp: Option<String>,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    pub state: TacState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl TacChallenge {
    /// Live means issued and not yet past expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state == TacState::Issued && now <= self.expires_at
    }

    /// Move to a terminal state. Returns false (and changes nothing) if the
    /// challenge was already resolved.
    pub fn resolve(&mut self, state: TacState, now: DateTime<Utc>) -> bool {
        if !self.state.can_transition_to(&state) {
            return false;
        }
        self.state = state;
        self.resolved_at = Some(now);
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RequestTacRequest {
    #[validate(length(min = 1, max = 32))]
    pub phone: String,
    #[validate(length(max = 6))]
    pub country_code: Option<String>,
    #[validate(length(max = 80))]
    pub display_name: Option<String>,
    pub ntrp: Option<String>,
    pub accept_terms: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerifyTacRequest {
    #[validate(length(min = 1, max = 32))]
    pub phone: String,
    #[validate(length(max = 6))]
    pub country_code: Option<String>,
    #[validate(length(min = 4, max = 12))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PhoneLoginRequest {
    #[validate(length(min = 1, max = 32))]
    pub phone: String,
    #[validate(length(max = 6))]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TacIssued {
    pub ok: bool,
    pub message: String,
    pub request_id: String,
    pub expires_in_seconds: u64,
    pub delivery: DeliveryReport,
    /// Present only when code echoing is enabled for non-production use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSuccess {
    pub ok: bool,
    pub message: String,
    pub session: IssuedSession,
    pub player: Player,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn challenge(now: DateTime<Utc>) -> TacChallenge {
        TacChallenge {
            id: "tac_0000000001".into(),
            country_code: "+60".into(),
            phone: "123456789".into(),
            whatsapp_number: "60123456789".into(),
            display_name: None,
            ntrp: None,
            code: "123456".into(),
            issued_at: now,
            expires_at: now + Duration::seconds(300),
            attempts: 0,
            state: TacState::Issued,
            resolved_at: None,
        }
    }

    #[test]
    fn test_transitions_only_leave_issued() {
        assert!(TacState::Issued.can_transition_to(&TacState::Consumed));
        assert!(TacState::Issued.can_transition_to(&TacState::Locked));
        assert!(!TacState::Issued.can_transition_to(&TacState::Issued));
        assert!(!TacState::Consumed.can_transition_to(&TacState::Expired));
        assert!(!TacState::Superseded.can_transition_to(&TacState::Consumed));
    }

    #[test]
    fn test_resolve_is_one_shot() {
        let now = Utc::now();
        let mut c = challenge(now);
        assert!(c.is_active(now));
        assert!(c.resolve(TacState::Consumed, now));
        assert!(!c.resolve(TacState::Expired, now));
        assert_eq!(c.state, TacState::Consumed);
        assert!(!c.is_active(now));
    }

    #[test]
    fn test_active_window() {
        let now = Utc::now();
        let c = challenge(now);
        assert!(c.is_active(now + Duration::seconds(300)));
        assert!(!c.is_active(now + Duration::seconds(301)));
    }
}
