use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api_error::ApiError;
use crate::db::DocumentStore;
use crate::models::{Document, IssuedSession, Player, Session};

const TOKEN_BYTES: usize = 32;

/// A resolved bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSession {
    pub session: Session,
    pub player: Player,
}

/// Opaque bearer sessions for players who signed in by phone.
pub struct SessionService {
    store: Arc<DocumentStore>,
    ttl: Option<Duration>,
}

impl SessionService {
    pub fn new(store: Arc<DocumentStore>, ttl: Option<Duration>) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Create a session for `player` inside an open transaction.
    ///
    /// The raw token exists only in the returned value; the document keeps its digest.
    pub fn issue(
        doc: &mut Document,
        player: &Player,
        now: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> IssuedSession {
        let token = generate_token();
        let session = Session {
            player_id: player.id.clone(),
            issued_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
        };
        doc.sessions.insert(token_digest(&token), session.clone());
        debug!(player_id = %player.id, "Session issued");

        IssuedSession {
            token,
            player_id: player.id.clone(),
            player_name: player.display_name.clone(),
            whatsapp_number: player.whatsapp_number.clone(),
            issued_at: session.issued_at,
            expires_at: session.expires_at,
        }
    }

    pub fn resolve(&self, token: &str) -> Result<ActiveSession, ApiError> {
        self.resolve_at(token, Utc::now())
    }

    pub fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Result<ActiveSession, ApiError> {
        let doc = self.store.snapshot();
        let session = doc
            .sessions
            .get(&token_digest(token))
            .filter(|s| !s.is_expired(now))
            .ok_or_else(|| ApiError::unauthorized("Session expired or invalid"))?;
        let player = doc
            .players
            .get(&session.player_id)
            .ok_or_else(|| ApiError::unauthorized("Session expired or invalid"))?;

        Ok(ActiveSession {
            session: session.clone(),
            player: player.clone(),
        })
    }

    /// Drop the session for `token`. Returns whether one existed.
    pub async fn revoke(&self, token: &str) -> Result<bool, ApiError> {
        let key = token_digest(token);
        let removed = self
            .store
            .with_transaction(|doc| Ok::<_, ApiError>(doc.sessions.remove(&key)))
            .await?;

        if let Some(session) = &removed {
            info!(player_id = %session.player_id, "Session revoked");
        }
        Ok(removed.is_some())
    }

    /// Remove expired sessions. Returns how many were removed.
    pub fn purge_expired(doc: &mut Document, now: DateTime<Utc>) -> usize {
        let before = doc.sessions.len();
        doc.sessions.retain(|_, session| !session.is_expired(now));
        before - doc.sessions.len()
    }

    /// Remove every session belonging to `player_id`.
    pub fn revoke_for_player(doc: &mut Document, player_id: &str) -> usize {
        let before = doc.sessions.len();
        doc.sessions.retain(|_, session| session.player_id != player_id);
        before - doc.sessions.len()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a bearer token; the key under which its session is stored.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
