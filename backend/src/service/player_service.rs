use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use validator::{Validate, ValidateEmail};

use crate::api_error::ApiError;
use crate::auth::SessionService;
use crate::db::DocumentStore;
use crate::models::*;
use crate::service::match_service::{enrich_match, sort_newest_first};
use crate::service::standings::player_stats;

const RECENT_MATCHES: usize = 10;

pub struct PlayerService {
    store: Arc<DocumentStore>,
    default_country_code: String,
}

impl PlayerService {
    pub fn new(store: Arc<DocumentStore>, default_country_code: String) -> Self {
        Self {
            store,
            default_country_code,
        }
    }

    /// Active players, optionally narrowed to a group and a name search, sorted by name.
    pub fn list(&self, query: &PlayerQuery) -> Result<Vec<Player>, ApiError> {
        let group = parse_group_filter(query.group.as_deref())?;
        let search = non_blank(query.search.as_deref()).map(|s| s.to_lowercase());

        let doc = self.store.snapshot();
        let mut players: Vec<Player> = doc
            .players
            .values()
            .filter(|p| p.active)
            .filter(|p| group.map_or(true, |g| p.group == g))
            .filter(|p| {
                search
                    .as_ref()
                    .map_or(true, |s| p.display_name.to_lowercase().contains(s))
            })
            .cloned()
            .collect();
        players.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(players)
    }

    pub fn get(&self, player_id: &str) -> Result<PlayerDetail, ApiError> {
        let doc = self.store.snapshot();
        let player = doc
            .players
            .get(player_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Player not found."))?;
        Ok(PlayerDetail {
            stats: player_stats(&doc, player_id),
            player,
        })
    }

    pub fn find_by_phone(&self, query: &PhoneLookupQuery) -> Result<Player, ApiError> {
        let phone = PhoneNumber::parse(
            &query.phone,
            query.country_code.as_deref(),
            &self.default_country_code,
        )
        .map_err(|e| ApiError::validation(e.to_string()))?;

        let doc = self.store.snapshot();
        doc.players
            .values()
            .filter(|p| p.whatsapp_number == phone.whatsapp)
            .max_by_key(|p| p.tac_verified)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Player not found."))
    }

    pub async fn create(&self, request: CreatePlayerRequest) -> Result<Player, ApiError> {
        request.validate()?;
        let now = Utc::now();

        let display_name = non_blank(Some(request.display_name.as_str()))
            .ok_or_else(|| ApiError::validation("Display name is required."))?;
        let ntrp = non_blank(request.ntrp.as_deref()).unwrap_or_else(|| "3.0".to_string());
        check_ntrp(&ntrp)?;
        let group = match non_blank(request.group.as_deref()) {
            Some(group) => parse_group(&group)?,
            None => SkillGroup::from_ntrp(&ntrp),
        };
        let phone = match non_blank(request.phone.as_deref()) {
            Some(raw) => Some(self.parse_phone(&raw, request.country_code.as_deref())?),
            None => None,
        };
        let email = clean_email(request.email.as_deref())?;
        let profile = request.profile.unwrap_or_default();
        check_profile_fields(&profile).map_err(ApiError::ValidationError)?;

        let player = Player {
            id: new_id("p"),
            display_name,
            ntrp,
            group,
            country_code: phone
                .as_ref()
                .map(|p| p.country_code.clone())
                .or_else(|| non_blank(request.country_code.as_deref()))
                .unwrap_or_else(|| self.default_country_code.clone()),
            phone: phone.as_ref().map(|p| p.local.clone()).unwrap_or_default(),
            whatsapp_number: phone.as_ref().map(|p| p.whatsapp.clone()).unwrap_or_default(),
            email,
            bio: non_blank(request.bio.as_deref()).unwrap_or_default(),
            profile,
            registered_via_whatsapp: phone.is_some(),
            tac_verified: true,
            active: true,
            created_at: now,
            updated_at: None,
        };

        let player = self
            .store
            .with_transaction(|doc| {
                ensure_number_free(doc, &player.whatsapp_number, None)?;
                doc.players.insert(player.id.clone(), player.clone());
                Ok::<_, ApiError>(player)
            })
            .await?;

        info!(player_id = %player.id, group = %player.group, "Player created");
        Ok(player)
    }

    pub async fn update(
        &self,
        player_id: &str,
        request: UpdatePlayerRequest,
    ) -> Result<Player, ApiError> {
        request.validate()?;
        let now = Utc::now();
        let default_country_code = self.default_country_code.clone();

        let player = self
            .store
            .with_transaction(|doc| {
                let mut player = doc
                    .players
                    .get(player_id)
                    .cloned()
                    .ok_or_else(|| ApiError::not_found("Player not found."))?;
                apply_update(&mut player, request, &default_country_code, now)?;
                ensure_number_free(doc, &player.whatsapp_number, Some(player_id))?;
                doc.players.insert(player.id.clone(), player.clone());
                Ok::<_, ApiError>(player)
            })
            .await?;

        info!(player_id = %player_id, "Player updated");
        Ok(player)
    }

    /// Remove the player and their sessions. Matches keep their references.
    pub async fn delete(&self, player_id: &str) -> Result<(), ApiError> {
        let sessions = self
            .store
            .with_transaction(|doc| {
                doc.players
                    .remove(player_id)
                    .ok_or_else(|| ApiError::not_found("Player not found."))?;
                Ok::<_, ApiError>(SessionService::revoke_for_player(doc, player_id))
            })
            .await?;

        info!(player_id = %player_id, sessions, "Player deleted");
        Ok(())
    }

    pub fn profile(&self, query: &ProfileQuery) -> Result<ProfileView, ApiError> {
        let player_id = non_blank(query.player_id.as_deref())
            .ok_or_else(|| ApiError::validation("player_id is required."))?;

        let doc = self.store.snapshot();
        let player = doc
            .players
            .get(&player_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Player not found."))?;

        let mut matches: Vec<&Match> = doc.matches.values().filter(|m| m.involves(&player_id)).collect();
        sort_newest_first(&mut matches);
        let recent_matches = matches
            .into_iter()
            .take(RECENT_MATCHES)
            .map(|m| enrich_match(&doc, m))
            .collect();

        Ok(ProfileView {
            stats: player_stats(&doc, &player_id),
            player,
            recent_matches,
        })
    }

    pub async fn update_profile(
        &self,
        player_id: &str,
        request: UpdateProfileRequest,
    ) -> Result<Player, ApiError> {
        request.validate()?;
        self.update(player_id, request.into()).await
    }

    fn parse_phone(&self, raw: &str, country_code: Option<&str>) -> Result<PhoneNumber, ApiError> {
        PhoneNumber::parse(raw, country_code, &self.default_country_code)
            .map_err(|e| ApiError::validation(e.to_string()))
    }
}

fn apply_update(
    player: &mut Player,
    request: UpdatePlayerRequest,
    default_country_code: &str,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if let Some(name) = request.display_name.as_deref() {
        player.display_name =
            non_blank(Some(name)).ok_or_else(|| ApiError::validation("Display name is required."))?;
    }

    let ntrp = non_blank(request.ntrp.as_deref());
    if let Some(ntrp) = &ntrp {
        check_ntrp(ntrp)?;
        player.ntrp = ntrp.clone();
    }
    match non_blank(request.group.as_deref()) {
        Some(group) => player.group = parse_group(&group)?,
        None if ntrp.is_some() => player.group = SkillGroup::from_ntrp(&player.ntrp),
        None => {}
    }

    if request.phone.is_some() || request.country_code.is_some() {
        let country_code = non_blank(request.country_code.as_deref())
            .unwrap_or_else(|| player.country_code.clone());
        let raw = request.phone.unwrap_or_else(|| player.phone.clone());
        if raw.trim().is_empty() {
            player.phone.clear();
            player.whatsapp_number.clear();
            player.country_code = country_code;
        } else {
            let phone = PhoneNumber::parse(&raw, Some(&country_code), default_country_code)
                .map_err(|e| ApiError::validation(e.to_string()))?;
            player.country_code = phone.country_code;
            player.phone = phone.local;
            player.whatsapp_number = phone.whatsapp;
        }
    }

    if request.email.is_some() {
        player.email = clean_email(request.email.as_deref())?;
    }
    if let Some(bio) = request.bio {
        player.bio = bio.trim().to_string();
    }
    if let Some(profile) = request.profile {
        check_profile_fields(&profile).map_err(ApiError::ValidationError)?;
        player.profile = profile;
    }
    if let Some(active) = request.active {
        player.active = active;
    }

    player.updated_at = Some(now);
    Ok(())
}

/// A WhatsApp number may belong to at most one verified player.
fn ensure_number_free(
    doc: &Document,
    whatsapp_number: &str,
    except: Option<&str>,
) -> Result<(), ApiError> {
    if whatsapp_number.is_empty() {
        return Ok(());
    }
    let taken = doc.players.values().any(|p| {
        p.tac_verified && p.whatsapp_number == whatsapp_number && Some(p.id.as_str()) != except
    });
    if taken {
        return Err(ApiError::conflict(
            "Another player is already registered with this WhatsApp number.",
        ));
    }
    Ok(())
}

fn check_ntrp(ntrp: &str) -> Result<(), ApiError> {
    if !is_valid_ntrp(ntrp) {
        return Err(ApiError::validation("NTRP level must be between 1.0 and 7.0."));
    }
    Ok(())
}

fn parse_group(group: &str) -> Result<SkillGroup, ApiError> {
    SkillGroup::parse(group)
        .ok_or_else(|| ApiError::validation(format!("Unknown group '{group}'.")))
}

/// `None`, blank and `ALL` mean no filter.
pub fn parse_group_filter(group: Option<&str>) -> Result<Option<SkillGroup>, ApiError> {
    match non_blank(group) {
        Some(g) if g.eq_ignore_ascii_case("ALL") => Ok(None),
        Some(g) => parse_group(&g).map(Some),
        None => Ok(None),
    }
}

fn clean_email(email: Option<&str>) -> Result<String, ApiError> {
    match non_blank(email) {
        Some(email) if !email.validate_email() => {
            Err(ApiError::validation("Email address is invalid."))
        }
        Some(email) => Ok(email),
        None => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    async fn service(dir: &TempDir) -> PlayerService {
        let store = DocumentStore::load(&StorageConfig::new(dir.path().join("store.json")))
            .await
            .unwrap();
        PlayerService::new(Arc::new(store), "+60".into())
    }

    fn create(name: &str) -> CreatePlayerRequest {
        CreatePlayerRequest {
            display_name: name.into(),
            ntrp: None,
            group: None,
            country_code: None,
            phone: None,
            email: None,
            bio: None,
            profile: None,
        }
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;

        let player = assert_ok!(service.create(create("  Hafiz ")).await);
        assert!(player.id.starts_with("p_"));
        assert_eq!(player.display_name, "Hafiz");
        assert_eq!(player.ntrp, "3.0");
        assert_eq!(player.group, SkillGroup::D4);
        assert_eq!(player.country_code, "+60");
        assert!(player.whatsapp_number.is_empty());
        assert!(!player.registered_via_whatsapp);
        assert!(player.active);
    }

    #[tokio::test]
    async fn test_crud_round_trip_is_lossless() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;

        let profile: ProfileFields = serde_json::from_value(json!({
            "handedness": "left",
            "years_playing": 12,
            "rating_trend": -0.25,
            "has_coach": true,
            "club": null
        }))
        .unwrap();
        let request = CreatePlayerRequest {
            ntrp: Some("4.5".into()),
            phone: Some("0123456789".into()),
            email: Some("mei@example.com".into()),
            bio: Some("Baseliner".into()),
            profile: Some(profile.clone()),
            ..create("Mei Ling")
        };
        let created = assert_ok!(service.create(request).await);
        assert_eq!(created.group, SkillGroup::D1);
        assert_eq!(created.whatsapp_number, "60123456789");

        let fetched = assert_ok!(service.get(&created.id));
        assert_eq!(fetched.player, created);
        assert_eq!(fetched.player.profile, profile);
        assert_eq!(fetched.stats, PlayerStats::default());

        let store = DocumentStore::load(&StorageConfig::new(dir.path().join("store.json")))
            .await
            .unwrap();
        assert_eq!(store.snapshot().players[&created.id], created);
    }

    #[tokio::test]
    async fn test_duplicate_whatsapp_number_conflicts() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;

        let first = assert_ok!(
            service
                .create(CreatePlayerRequest {
                    phone: Some("0123456789".into()),
                    ..create("First")
                })
                .await
        );
        let err = assert_err!(
            service
                .create(CreatePlayerRequest {
                    phone: Some("+60 12 345 6789".into()),
                    ..create("Second")
                })
                .await
        );
        assert!(matches!(err, ApiError::Conflict(_)));

        // Updating the owner with its own number is fine.
        let update = UpdatePlayerRequest {
            phone: Some("0123456789".into()),
            ..Default::default()
        };
        assert_ok!(service.update(&first.id, update).await);
    }

    #[tokio::test]
    async fn test_update_recomputes_group_from_ntrp() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        let player = assert_ok!(service.create(create("Raj")).await);

        let updated = assert_ok!(
            service
                .update(
                    &player.id,
                    UpdatePlayerRequest {
                        ntrp: Some("4.0".into()),
                        ..Default::default()
                    }
                )
                .await
        );
        assert_eq!(updated.group, SkillGroup::D2);
        assert!(updated.updated_at.is_some());

        let pinned = assert_ok!(
            service
                .update(
                    &player.id,
                    UpdatePlayerRequest {
                        ntrp: Some("2.5".into()),
                        group: Some("d1".into()),
                        ..Default::default()
                    }
                )
                .await
        );
        assert_eq!(pinned.group, SkillGroup::D1);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;

        let bad = [
            create("   "),
            CreatePlayerRequest {
                ntrp: Some("8.5".into()),
                ..create("X")
            },
            CreatePlayerRequest {
                group: Some("D9".into()),
                ..create("X")
            },
            CreatePlayerRequest {
                email: Some("not-an-email".into()),
                ..create("X")
            },
            CreatePlayerRequest {
                phone: Some("123".into()),
                ..create("X")
            },
        ];
        for request in bad {
            let err = assert_err!(service.create(request).await);
            assert!(matches!(err, ApiError::ValidationError(_)), "{err:?}");
        }

        let err = assert_err!(service.update("p_missing", UpdatePlayerRequest::default()).await);
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_inactive_group_and_search() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;

        for (name, ntrp) in [("zara", "4.5"), ("Adam", "4.6"), ("Bella", "3.0")] {
            assert_ok!(
                service
                    .create(CreatePlayerRequest {
                        ntrp: Some(ntrp.into()),
                        ..create(name)
                    })
                    .await
            );
        }
        let gone = assert_ok!(service.create(create("Adriana")).await);
        assert_ok!(
            service
                .update(
                    &gone.id,
                    UpdatePlayerRequest {
                        active: Some(false),
                        ..Default::default()
                    }
                )
                .await
        );

        let all = assert_ok!(service.list(&PlayerQuery::default()));
        let names: Vec<&str> = all.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, vec!["Adam", "Bella", "zara"]);

        let d1 = assert_ok!(service.list(&PlayerQuery {
            group: Some("D1".into()),
            search: None
        }));
        assert_eq!(d1.len(), 2);

        let search = assert_ok!(service.list(&PlayerQuery {
            group: Some("all".into()),
            search: Some("AD".into())
        }));
        assert_eq!(search.len(), 1);

        assert!(service
            .list(&PlayerQuery {
                group: Some("D7".into()),
                search: None
            })
            .is_err());
    }

    #[tokio::test]
    async fn test_find_by_phone() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        let player = assert_ok!(
            service
                .create(CreatePlayerRequest {
                    phone: Some("0123456789".into()),
                    ..create("Siti")
                })
                .await
        );

        let found = assert_ok!(service.find_by_phone(&PhoneLookupQuery {
            phone: "123456789".into(),
            country_code: Some("+60".into()),
        }));
        assert_eq!(found.id, player.id);

        let err = assert_err!(service.find_by_phone(&PhoneLookupQuery {
            phone: "199999999".into(),
            country_code: None,
        }));
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_sessions_but_keeps_matches() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        let player = assert_ok!(service.create(create("Lim")).await);
        let other = assert_ok!(service.create(create("Tan")).await);

        service
            .store
            .with_transaction(|doc| {
                SessionService::issue(doc, &player, Utc::now(), None);
                SessionService::issue(doc, &other, Utc::now(), None);
                doc.matches.insert(
                    "m_1".into(),
                    Match {
                        id: "m_1".into(),
                        season: "2026-S1".into(),
                        stage: REGULAR_STAGE.into(),
                        date: Utc::now().date_naive(),
                        scheduled_at: None,
                        player_a_id: player.id.clone(),
                        player_b_id: other.id.clone(),
                        score: "6-0".into(),
                        winner_id: Some(player.id.clone()),
                        status: MatchStatus::Completed,
                        created_by: MatchOrigin::Admin,
                        created_at: Utc::now(),
                        updated_at: None,
                    },
                );
                Ok::<_, ApiError>(())
            })
            .await
            .unwrap();

        assert_ok!(service.delete(&player.id).await);
        let doc = service.store.snapshot();
        assert_eq!(doc.sessions.len(), 1);
        assert!(doc.matches.contains_key("m_1"));

        let err = assert_err!(service.get(&player.id));
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = assert_err!(service.delete(&player.id).await);
        assert!(matches!(err, ApiError::NotFound(_)));

        let profile = assert_ok!(service.profile(&ProfileQuery {
            player_id: Some(other.id.clone())
        }));
        assert_eq!(profile.recent_matches.len(), 1);
        assert_eq!(profile.recent_matches[0].player_a_name, "Unknown");
        assert_eq!(profile.stats.lost, 1);
    }

    #[tokio::test]
    async fn test_profile_update_round_trip() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        let player = assert_ok!(service.create(create("Nurul")).await);

        let profile: ProfileFields =
            serde_json::from_value(json!({"favourite_shot": "drop", "lefty": false})).unwrap();
        let updated = assert_ok!(
            service
                .update_profile(
                    &player.id,
                    UpdateProfileRequest {
                        bio: Some("Weekend player".into()),
                        profile: Some(profile.clone()),
                        ..Default::default()
                    }
                )
                .await
        );
        assert_eq!(updated.display_name, "Nurul");
        assert_eq!(updated.bio, "Weekend player");

        let view = assert_ok!(service.profile(&ProfileQuery {
            player_id: Some(player.id.clone())
        }));
        assert_eq!(view.player.profile, profile);
        assert!(view.recent_matches.is_empty());

        let err = assert_err!(service.profile(&ProfileQuery { player_id: None }));
        assert!(matches!(err, ApiError::ValidationError(_)));
    }
}
