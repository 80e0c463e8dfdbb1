use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::api_error::ApiError;
use crate::auth::SessionService;
use crate::config::TacConfig;
use crate::db::DocumentStore;
use crate::models::*;
use crate::service::whatsapp::{mask, CodeSender};

/// Resolved challenges are kept this long before the sweep drops them.
const RESOLVED_RETENTION_HOURS: i64 = 24;

/// What a verification attempt did to the challenge, decided inside the
/// transaction so that attempt counts and expiry are persisted even when
/// the caller gets an error.
enum VerifyOutcome {
    Verified(AuthSuccess),
    NoChallenge,
    Expired,
    Mismatch { remaining: u32 },
    Locked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub challenges: usize,
    pub sessions: usize,
}

/// Phone registration by time-limited access code.
///
/// Per phone: `Issued -> Consumed | Expired | Locked`, and an issued code
/// replaced by a newer request becomes `Superseded`.
pub struct TacAuthenticator {
    store: Arc<DocumentStore>,
    sender: Arc<dyn CodeSender>,
    config: TacConfig,
    session_ttl: Option<Duration>,
}

impl TacAuthenticator {
    pub fn new(
        store: Arc<DocumentStore>,
        sender: Arc<dyn CodeSender>,
        config: TacConfig,
        session_ttl: Option<Duration>,
    ) -> Self {
        Self {
            store,
            sender,
            config,
            session_ttl,
        }
    }

    // =============================================================================
    // REQUEST CODE
    // =============================================================================

    pub async fn request_code(&self, request: RequestTacRequest) -> Result<TacIssued, ApiError> {
        self.request_code_at(request, Utc::now()).await
    }

    /// Issue a fresh code for the phone, superseding any live one.
    ///
    /// The challenge is committed before delivery is attempted; a failed
    /// delivery is reported in the response and the challenge stays valid.
    pub async fn request_code_at(
        &self,
        request: RequestTacRequest,
        now: DateTime<Utc>,
    ) -> Result<TacIssued, ApiError> {
        request.validate()?;

        if request.accept_terms == Some(false) {
            return Err(ApiError::validation("You must accept Terms and Conditions."));
        }
        let display_name = non_blank(request.display_name.as_deref());
        let ntrp = non_blank(request.ntrp.as_deref());
        if let Some(ntrp) = &ntrp {
            if !is_valid_ntrp(ntrp) {
                return Err(ApiError::validation("NTRP level must be between 1.0 and 7.0."));
            }
        }
        let phone = self.parse_phone(&request.phone, request.country_code.as_deref())?;

        let code = generate_code(self.config.code_length);
        let challenge = TacChallenge {
            id: new_id("tac"),
            country_code: phone.country_code.clone(),
            phone: phone.local.clone(),
            whatsapp_number: phone.whatsapp.clone(),
            display_name,
            ntrp,
            code: code.clone(),
            issued_at: now,
            expires_at: now + self.config.expiry(),
            attempts: 0,
            state: TacState::Issued,
            resolved_at: None,
        };
        let request_id = challenge.id.clone();

        let superseded = self
            .store
            .with_transaction(|doc| {
                let mut superseded = 0;
                for previous in doc
                    .tac_challenges
                    .values_mut()
                    .filter(|c| c.whatsapp_number == challenge.whatsapp_number)
                {
                    if previous.resolve(TacState::Superseded, now) {
                        superseded += 1;
                    }
                }
                doc.tac_challenges.insert(challenge.id.clone(), challenge);
                Ok::<_, ApiError>(superseded)
            })
            .await?;

        info!(
            request_id = %request_id,
            to = %mask(&phone.whatsapp),
            superseded,
            "TAC issued"
        );

        let delivery = match self.sender.send_code(&phone.whatsapp, &code).await {
            Ok(report) => report,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "TAC delivery failed");
                DeliveryReport::failed(self.sender.provider(), &e)
            }
        };

        let message = if delivery.delivered {
            "TAC sent to WhatsApp."
        } else {
            "TAC issued."
        };

        Ok(TacIssued {
            ok: true,
            message: message.to_string(),
            request_id,
            expires_in_seconds: self.config.expiry_secs,
            delivery,
            code: self.config.expose_code.then_some(code),
        })
    }

    // =============================================================================
    // VERIFY CODE
    // =============================================================================

    pub async fn verify_code(&self, request: VerifyTacRequest) -> Result<AuthSuccess, ApiError> {
        self.verify_code_at(request, Utc::now()).await
    }

    pub async fn verify_code_at(
        &self,
        request: VerifyTacRequest,
        now: DateTime<Utc>,
    ) -> Result<AuthSuccess, ApiError> {
        request.validate()?;
        let phone = self.parse_phone(&request.phone, request.country_code.as_deref())?;
        let code = request.code.trim().to_string();
        let max_attempts = self.config.max_attempts;
        let session_ttl = self.session_ttl;

        let outcome = self
            .store
            .with_transaction(|doc| {
                let Some(challenge) = doc
                    .tac_challenges
                    .values_mut()
                    .filter(|c| {
                        c.whatsapp_number == phone.whatsapp && c.state == TacState::Issued
                    })
                    .max_by_key(|c| c.issued_at)
                else {
                    return Ok::<_, ApiError>(VerifyOutcome::NoChallenge);
                };

                if now > challenge.expires_at {
                    challenge.resolve(TacState::Expired, now);
                    return Ok(VerifyOutcome::Expired);
                }

                if !codes_match(&challenge.code, &code) {
                    challenge.attempts += 1;
                    if challenge.attempts >= max_attempts {
                        challenge.resolve(TacState::Locked, now);
                        return Ok(VerifyOutcome::Locked);
                    }
                    return Ok(VerifyOutcome::Mismatch {
                        remaining: max_attempts - challenge.attempts,
                    });
                }

                challenge.resolve(TacState::Consumed, now);
                let challenge = challenge.clone();

                let player = upsert_verified_player(doc, &challenge, now);
                let session = SessionService::issue(doc, &player, now, session_ttl);
                Ok(VerifyOutcome::Verified(AuthSuccess {
                    ok: true,
                    message: "Registration complete.".to_string(),
                    session,
                    player,
                }))
            })
            .await?;

        match outcome {
            VerifyOutcome::Verified(success) => {
                info!(player_id = %success.player.id, "TAC verified");
                Ok(success)
            }
            VerifyOutcome::NoChallenge => {
                debug!(to = %mask(&phone.whatsapp), "No live TAC challenge");
                Err(ApiError::not_found(
                    "No valid TAC request found. Please request a new TAC.",
                ))
            }
            VerifyOutcome::Expired => {
                info!(to = %mask(&phone.whatsapp), "TAC expired");
                Err(ApiError::Expired(
                    "TAC has expired. Please request a new TAC.".to_string(),
                ))
            }
            VerifyOutcome::Mismatch { remaining } => {
                warn!(to = %mask(&phone.whatsapp), remaining, "Invalid TAC code");
                Err(ApiError::InvalidCode {
                    remaining_attempts: remaining,
                })
            }
            VerifyOutcome::Locked => {
                warn!(to = %mask(&phone.whatsapp), "TAC challenge locked");
                Err(ApiError::TooManyAttempts)
            }
        }
    }

    // =============================================================================
    // LOGIN
    // =============================================================================

    pub async fn login_by_phone(&self, request: PhoneLoginRequest) -> Result<AuthSuccess, ApiError> {
        self.login_by_phone_at(request, Utc::now()).await
    }

    /// Sign in a player who has already verified this number.
    pub async fn login_by_phone_at(
        &self,
        request: PhoneLoginRequest,
        now: DateTime<Utc>,
    ) -> Result<AuthSuccess, ApiError> {
        request.validate()?;
        let phone = self.parse_phone(&request.phone, request.country_code.as_deref())?;
        let session_ttl = self.session_ttl;

        let success = self
            .store
            .with_transaction(|doc| {
                let player = doc
                    .players
                    .values()
                    .find(|p| p.whatsapp_number == phone.whatsapp && p.tac_verified)
                    .cloned()
                    .ok_or(ApiError::NotRegistered)?;
                let session = SessionService::issue(doc, &player, now, session_ttl);
                Ok::<_, ApiError>(AuthSuccess {
                    ok: true,
                    message: "Signed in.".to_string(),
                    session,
                    player,
                })
            })
            .await?;

        info!(player_id = %success.player.id, "Player signed in by phone");
        Ok(success)
    }

    // =============================================================================
    // MAINTENANCE
    // =============================================================================

    /// Drop challenges that expired or were resolved more than a day ago,
    /// and sessions past their expiry. Verification never depends on this.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ApiError> {
        let cutoff = now - Duration::hours(RESOLVED_RETENTION_HOURS);

        let report = self
            .store
            .with_transaction(|doc| {
                let before = doc.tac_challenges.len();
                doc.tac_challenges.retain(|_, c| {
                    let finished_at = c.resolved_at.unwrap_or(c.expires_at);
                    finished_at > cutoff || c.is_active(now)
                });
                let challenges = before - doc.tac_challenges.len();
                let sessions = SessionService::purge_expired(doc, now);
                Ok::<_, ApiError>(SweepReport {
                    challenges,
                    sessions,
                })
            })
            .await?;

        if report != SweepReport::default() {
            info!(
                challenges = report.challenges,
                sessions = report.sessions,
                "Swept stale TAC challenges and sessions"
            );
        }
        Ok(report)
    }

    fn parse_phone(&self, raw: &str, country_code: Option<&str>) -> Result<PhoneNumber, ApiError> {
        PhoneNumber::parse(raw, country_code, &self.config.default_country_code)
            .map_err(|e| ApiError::validation(e.to_string()))
    }
}

/// Uniform random code of exactly `length` digits, leading zeros kept.
pub fn generate_code(length: u32) -> String {
    let upper = 10u64.pow(length);
    let value = OsRng.gen_range(0..upper);
    format!("{:0width$}", value, width = length as usize)
}

fn codes_match(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    expected
        .bytes()
        .zip(provided.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Create the player for a verified number, or mark the existing one verified.
fn upsert_verified_player(doc: &mut Document, challenge: &TacChallenge, now: DateTime<Utc>) -> Player {
    let existing_id = doc
        .players
        .values()
        .filter(|p| p.whatsapp_number == challenge.whatsapp_number)
        .max_by_key(|p| p.tac_verified)
        .map(|p| p.id.clone());

    if let Some(player) = existing_id.and_then(|id| doc.players.get_mut(&id)) {
        if let Some(name) = &challenge.display_name {
            player.display_name = name.clone();
        }
        if let Some(ntrp) = &challenge.ntrp {
            player.ntrp = ntrp.clone();
            player.group = SkillGroup::from_ntrp(ntrp);
        }
        player.country_code = challenge.country_code.clone();
        player.phone = challenge.phone.clone();
        player.registered_via_whatsapp = true;
        player.tac_verified = true;
        player.active = true;
        player.updated_at = Some(now);
        return player.clone();
    }

    let ntrp = challenge.ntrp.clone().unwrap_or_else(|| "3.0".to_string());
    let suffix_start = challenge.whatsapp_number.len().saturating_sub(4);
    let player = Player {
        id: new_id("p"),
        display_name: challenge
            .display_name
            .clone()
            .unwrap_or_else(|| format!("Player {}", &challenge.whatsapp_number[suffix_start..])),
        group: SkillGroup::from_ntrp(&ntrp),
        ntrp,
        country_code: challenge.country_code.clone(),
        phone: challenge.phone.clone(),
        whatsapp_number: challenge.whatsapp_number.clone(),
        email: String::new(),
        bio: String::new(),
        profile: ProfileFields::new(),
        registered_via_whatsapp: true,
        tac_verified: true,
        active: true,
        created_at: now,
        updated_at: None,
    };
    doc.players.insert(player.id.clone(), player.clone());
    player
}
