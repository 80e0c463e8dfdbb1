#[cfg(test)]
mod tests {
    use crate::api_error::ApiError;
    use crate::config::{StorageConfig, TacConfig};
    use crate::db::DocumentStore;
    use crate::models::*;
    use crate::service::tac_service::TacAuthenticator;
    use crate::service::whatsapp::{CodeSender, DeliveryError};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    const PHONE: &str = "012-345 6789";
    const WHATSAPP: &str = "60123456789";

    /// Captures every code handed to it; optionally fails like an unreachable API.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingSender {
        fn last_code(&self) -> String {
            self.sent.lock().last().map(|(_, code)| code.clone()).unwrap()
        }
    }

    #[async_trait]
    impl CodeSender for RecordingSender {
        fn provider(&self) -> &str {
            "recording"
        }

        async fn send_code(
            &self,
            whatsapp_number: &str,
            code: &str,
        ) -> Result<DeliveryReport, DeliveryError> {
            self.sent
                .lock()
                .push((whatsapp_number.to_string(), code.to_string()));
            if self.fail {
                return Err(DeliveryError::Rejected {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            Ok(DeliveryReport {
                provider: "recording".into(),
                delivered: true,
                detail: "ok".into(),
            })
        }
    }

    struct Harness {
        _dir: TempDir,
        store: Arc<DocumentStore>,
        sender: Arc<RecordingSender>,
        tac: TacAuthenticator,
    }

    async fn harness_with(config: TacConfig, sender: RecordingSender) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            DocumentStore::load(&StorageConfig::new(dir.path().join("store.json")))
                .await
                .unwrap(),
        );
        let sender = Arc::new(sender);
        let tac = TacAuthenticator::new(store.clone(), sender.clone(), config, None);
        Harness {
            _dir: dir,
            store,
            sender,
            tac,
        }
    }

    async fn harness() -> Harness {
        harness_with(TacConfig::default(), RecordingSender::default()).await
    }

    fn request(name: &str) -> RequestTacRequest {
        RequestTacRequest {
            phone: PHONE.into(),
            country_code: Some("+60".into()),
            display_name: Some(name.into()),
            ntrp: Some("3.5".into()),
            accept_terms: Some(true),
        }
    }

    fn verify(code: &str) -> VerifyTacRequest {
        VerifyTacRequest {
            phone: PHONE.into(),
            country_code: Some("+60".into()),
            code: code.into(),
        }
    }

    fn wrong(code: &str) -> String {
        let first = if code.starts_with('0') { '1' } else { '0' };
        format!("{first}{}", &code[1..])
    }

    #[tokio::test]
    async fn test_code_verifies_exactly_once() {
        let h = harness().await;
        let issued = assert_ok!(h.tac.request_code(request("Nadia")).await);
        assert!(issued.ok);
        assert_eq!(issued.expires_in_seconds, 300);
        assert!(issued.code.is_none());
        assert!(issued.delivery.delivered);

        let code = h.sender.last_code();
        assert_eq!(code.len(), 6);

        let success = assert_ok!(h.tac.verify_code(verify(&code)).await);
        assert_eq!(success.player.display_name, "Nadia");
        assert_eq!(success.player.whatsapp_number, WHATSAPP);
        assert_eq!(success.player.group, SkillGroup::D3);
        assert!(success.player.tac_verified);
        assert!(success.player.registered_via_whatsapp);
        assert_eq!(success.session.player_id, success.player.id);

        let err = assert_err!(h.tac.verify_code(verify(&code)).await);
        assert!(matches!(err, ApiError::NotFound(_)));

        let doc = h.store.snapshot();
        assert_eq!(doc.tac_challenges[&issued.request_id].state, TacState::Consumed);
        assert_eq!(doc.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_expose_code_echoes_code() {
        let config = TacConfig {
            expose_code: true,
            ..TacConfig::default()
        };
        let h = harness_with(config, RecordingSender::default()).await;
        let issued = assert_ok!(h.tac.request_code(request("Nadia")).await);
        assert_eq!(issued.code, Some(h.sender.last_code()));
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected_regardless_of_value() {
        let h = harness().await;
        let now = Utc::now();
        assert_ok!(h.tac.request_code_at(request("Nadia"), now).await);
        let code = h.sender.last_code();

        let later = now + Duration::seconds(301);
        let err = assert_err!(h.tac.verify_code_at(verify(&code), later).await);
        assert!(matches!(err, ApiError::Expired(_)));

        // The expiry was persisted, so the challenge is gone for good.
        let err = assert_err!(h.tac.verify_code_at(verify(&code), later).await);
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(h.store.snapshot().players.is_empty());
    }

    #[tokio::test]
    async fn test_new_request_supersedes_previous_code() {
        let h = harness().await;
        let first = assert_ok!(h.tac.request_code(request("Nadia")).await);
        let first_code = h.sender.last_code();
        let second = assert_ok!(h.tac.request_code(request("Nadia")).await);
        let second_code = h.sender.last_code();

        let doc = h.store.snapshot();
        assert_eq!(doc.tac_challenges[&first.request_id].state, TacState::Superseded);
        assert_eq!(doc.tac_challenges[&second.request_id].state, TacState::Issued);

        if first_code != second_code {
            let err = assert_err!(h.tac.verify_code(verify(&first_code)).await);
            assert!(matches!(err, ApiError::InvalidCode { .. }));
        }
        assert_ok!(h.tac.verify_code(verify(&second_code)).await);
    }

    #[tokio::test]
    async fn test_wrong_codes_lock_the_challenge() {
        let h = harness().await;
        let issued = assert_ok!(h.tac.request_code(request("Nadia")).await);
        let code = h.sender.last_code();
        let bad = wrong(&code);

        for expected_remaining in [4, 3, 2, 1] {
            let err = assert_err!(h.tac.verify_code(verify(&bad)).await);
            match err {
                ApiError::InvalidCode { remaining_attempts } => {
                    assert_eq!(remaining_attempts, expected_remaining)
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let err = assert_err!(h.tac.verify_code(verify(&bad)).await);
        assert!(matches!(err, ApiError::TooManyAttempts));

        let err = assert_err!(h.tac.verify_code(verify(&code)).await);
        assert!(matches!(err, ApiError::NotFound(_)));

        let doc = h.store.snapshot();
        let challenge = &doc.tac_challenges[&issued.request_id];
        assert_eq!(challenge.state, TacState::Locked);
        assert_eq!(challenge.attempts, 5);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_challenge() {
        let sender = RecordingSender {
            fail: true,
            ..Default::default()
        };
        let h = harness_with(TacConfig::default(), sender).await;

        let issued = assert_ok!(h.tac.request_code(request("Nadia")).await);
        assert!(!issued.delivery.delivered);
        assert_eq!(issued.delivery.provider, "recording");
        assert!(issued.delivery.detail.contains("503"));

        let code = h.sender.last_code();
        assert_ok!(h.tac.verify_code(verify(&code)).await);
    }

    #[tokio::test]
    async fn test_login_requires_verified_player() {
        let h = harness().await;
        let login = PhoneLoginRequest {
            phone: "+60 12 345 6789".into(),
            country_code: None,
        };

        let err = assert_err!(h.tac.login_by_phone(login.clone()).await);
        assert!(matches!(err, ApiError::NotRegistered));

        assert_ok!(h.tac.request_code(request("Nadia")).await);
        let code = h.sender.last_code();
        let registered = assert_ok!(h.tac.verify_code(verify(&code)).await);

        let success = assert_ok!(h.tac.login_by_phone(login).await);
        assert_eq!(success.player.id, registered.player.id);
        assert_ne!(success.session.token, registered.session.token);
        assert_eq!(h.store.snapshot().sessions.len(), 2);
    }

    #[tokio::test]
    async fn test_verification_reactivates_existing_player() {
        let h = harness().await;
        let now = Utc::now();
        h.store
            .with_transaction(|doc| {
                let player = Player {
                    id: "p_existing01".into(),
                    display_name: "Old Name".into(),
                    ntrp: "4.0".into(),
                    group: SkillGroup::D2,
                    country_code: "+60".into(),
                    phone: "123456789".into(),
                    whatsapp_number: WHATSAPP.into(),
                    email: "old@example.com".into(),
                    bio: String::new(),
                    profile: ProfileFields::new(),
                    registered_via_whatsapp: false,
                    tac_verified: false,
                    active: false,
                    created_at: now,
                    updated_at: None,
                };
                doc.players.insert(player.id.clone(), player);
                Ok::<_, ApiError>(())
            })
            .await
            .unwrap();

        let mut req = request("New Name");
        req.ntrp = None;
        assert_ok!(h.tac.request_code(req).await);
        let code = h.sender.last_code();
        let success = assert_ok!(h.tac.verify_code(verify(&code)).await);

        assert_eq!(success.player.id, "p_existing01");
        assert_eq!(success.player.display_name, "New Name");
        assert_eq!(success.player.ntrp, "4.0");
        assert_eq!(success.player.email, "old@example.com");
        assert!(success.player.active);
        assert!(success.player.tac_verified);
        assert_eq!(h.store.snapshot().players.len(), 1);
    }

    #[tokio::test]
    async fn test_registration_without_details_uses_defaults() {
        let h = harness().await;
        let req = RequestTacRequest {
            phone: "+60123456789".into(),
            country_code: None,
            display_name: None,
            ntrp: None,
            accept_terms: None,
        };
        assert_ok!(h.tac.request_code(req).await);
        let code = h.sender.last_code();
        let success = assert_ok!(h.tac.verify_code(verify(&code)).await);
        assert_eq!(success.player.display_name, "Player 6789");
        assert_eq!(success.player.ntrp, "3.0");
        assert_eq!(success.player.group, SkillGroup::D4);
    }

    #[tokio::test]
    async fn test_request_validation() {
        let h = harness().await;

        let mut req = request("Nadia");
        req.accept_terms = Some(false);
        let err = assert_err!(h.tac.request_code(req).await);
        assert!(matches!(err, ApiError::ValidationError(_)));

        let mut req = request("Nadia");
        req.phone = "12345".into();
        let err = assert_err!(h.tac.request_code(req).await);
        assert!(matches!(err, ApiError::ValidationError(_)));

        let mut req = request("Nadia");
        req.ntrp = Some("9.5".into());
        let err = assert_err!(h.tac.request_code(req).await);
        assert!(matches!(err, ApiError::ValidationError(_)));

        assert!(h.sender.sent.lock().is_empty());
        assert!(h.store.snapshot().tac_challenges.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_reclaims_stale_challenges() {
        let h = harness().await;
        let now = Utc::now();
        assert_ok!(h.tac.request_code_at(request("Nadia"), now).await);

        let report = assert_ok!(h.tac.sweep(now + Duration::minutes(10)).await);
        assert_eq!(report.challenges, 0);

        let report = assert_ok!(h.tac.sweep(now + Duration::hours(25)).await);
        assert_eq!(report.challenges, 1);
        assert!(h.store.snapshot().tac_challenges.is_empty());
    }
}
