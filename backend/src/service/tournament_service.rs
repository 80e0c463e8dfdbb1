use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

use crate::api_error::ApiError;
use crate::db::DocumentStore;
use crate::models::*;

/// Single-elimination bracket per season.
///
/// A recorded winner moves into the next round at slot `slot / 2`, as
/// player 1 from an even slot and player 2 from an odd one.
pub struct TournamentService {
    store: Arc<DocumentStore>,
    default_season: String,
}

impl TournamentService {
    pub fn new(store: Arc<DocumentStore>, default_season: String) -> Self {
        Self {
            store,
            default_season,
        }
    }

    pub fn bracket(&self, query: &TournamentQuery) -> BracketView {
        let season = non_blank(query.season.as_deref()).unwrap_or_else(|| self.default_season.clone());
        let doc = self.store.snapshot();

        let mut matches: Vec<&TournamentMatch> = doc
            .tournament_matches
            .values()
            .filter(|m| m.season == season)
            .collect();
        matches.sort_by_key(|m| (m.round, m.slot));

        let slot_name = |id: Option<&str>| match id {
            Some(id) => doc.player_name(Some(id), "Unknown"),
            None => "TBD".to_string(),
        };
        let matches = matches
            .into_iter()
            .map(|m| TournamentMatchView {
                round_number: m.round.number(),
                status: m.status(),
                player1_name: slot_name(m.player1_id.as_deref()),
                player2_name: slot_name(m.player2_id.as_deref()),
                winner_name: slot_name(m.winner_id.as_deref()),
                match_data: m.clone(),
            })
            .collect();

        BracketView { season, matches }
    }

    /// Upsert the match at `(season, round, slot)` and advance its winner.
    pub async fn record_result(
        &self,
        request: RecordTournamentMatchRequest,
    ) -> Result<RecordOutcome, ApiError> {
        self.record_result_at(request, Utc::now()).await
    }

    pub async fn record_result_at(
        &self,
        request: RecordTournamentMatchRequest,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, ApiError> {
        request.validate()?;
        let season = non_blank(Some(request.season.as_str()))
            .ok_or_else(|| ApiError::validation("season is required."))?;
        let round = Round::parse(&request.round).ok_or_else(|| {
            ApiError::validation(format!("Unknown round '{}'.", request.round))
        })?;
        if request.slot >= round.match_count() {
            return Err(ApiError::validation(format!(
                "Slot {} is out of range for {round} (0..{}).",
                request.slot,
                round.match_count()
            )));
        }

        let outcome = self
            .store
            .with_transaction(|doc| record(doc, &season, round, request, now))
            .await?;

        info!(
            season = %season,
            round = %round,
            slot = outcome.recorded.slot,
            winner = ?outcome.recorded.winner_id,
            advanced = outcome.advanced_to.is_some(),
            "Tournament result recorded"
        );
        Ok(outcome)
    }

    /// Remove a match and withdraw the winner it advanced.
    ///
    /// Refused when the next-round match was already played with that winner,
    /// or when removing the last match of a round would split the bracket.
    pub async fn delete(&self, match_id: &str) -> Result<(), ApiError> {
        let now = Utc::now();
        self.store
            .with_transaction(|doc| {
                let removed = doc
                    .tournament_matches
                    .remove(match_id)
                    .ok_or_else(|| ApiError::not_found("Tournament match not found."))?;
                check_round_removable(doc, &removed)?;

                let withdrawn = TournamentMatch {
                    winner_id: None,
                    ..removed.clone()
                };
                check_downstream_open(doc, &withdrawn, removed.winner_id.as_deref())?;
                advance(doc, &withdrawn, removed.winner_id.as_deref(), now);
                Ok::<_, ApiError>(())
            })
            .await?;

        info!(match_id = %match_id, "Tournament match deleted");
        Ok(())
    }
}

fn record(
    doc: &mut Document,
    season: &str,
    round: Round,
    request: RecordTournamentMatchRequest,
    now: DateTime<Utc>,
) -> Result<RecordOutcome, ApiError> {
    let existing = doc.tournament_match_at(season, round, request.slot).cloned();
    if existing.is_none() {
        check_contiguous(doc, season, round)?;
    }

    let mut recorded = existing.clone().unwrap_or_else(|| TournamentMatch {
        id: new_id("t"),
        season: season.to_string(),
        round,
        slot: request.slot,
        player1_id: None,
        player2_id: None,
        winner_id: None,
        score: String::new(),
        date: None,
        created_at: now,
        updated_at: None,
    });

    for (side, requested) in [
        (SlotSide::Player1, non_blank(request.player1_id.as_deref())),
        (SlotSide::Player2, non_blank(request.player2_id.as_deref())),
    ] {
        let player = fill_slot(doc, &recorded, side, requested)?;
        recorded.set_slot_player(side, player);
    }
    if let (Some(p1), Some(p2)) = (&recorded.player1_id, &recorded.player2_id) {
        if p1 == p2 {
            return Err(ApiError::validation("Players must be different."));
        }
    }

    let winner = non_blank(request.winner_id.as_deref());
    if let Some(winner) = &winner {
        if recorded.player1_id.is_none() || recorded.player2_id.is_none() {
            return Err(ApiError::validation(
                "Both players must be known before a winner is recorded.",
            ));
        }
        if recorded.player1_id.as_ref() != Some(winner) && recorded.player2_id.as_ref() != Some(winner) {
            return Err(ApiError::validation("Winner must be one of the match players."));
        }
    }

    let previous_winner = existing.as_ref().and_then(|m| m.winner_id.clone());
    recorded.winner_id = winner;
    check_downstream_open(doc, &recorded, previous_winner.as_deref())?;

    if let Some(score) = request.score {
        recorded.score = score.trim().to_string();
    }
    if request.date.is_some() {
        recorded.date = request.date;
    }
    if existing.is_some() {
        recorded.updated_at = Some(now);
    }
    doc.tournament_matches
        .insert(recorded.id.clone(), recorded.clone());

    let advanced_to = advance(doc, &recorded, previous_winner.as_deref(), now);
    Ok(RecordOutcome {
        recorded,
        advanced_to,
    })
}

/// Resolve what goes into one slot.
///
/// A slot fed by an existing earlier-round match only ever holds that
/// match's winner; an unfed slot takes what was requested, or keeps its
/// current player.
fn fill_slot(
    doc: &Document,
    current: &TournamentMatch,
    side: SlotSide,
    requested: Option<String>,
) -> Result<Option<String>, ApiError> {
    let feeder = current
        .feeder_position(side)
        .and_then(|(round, slot)| doc.tournament_match_at(&current.season, round, slot));

    let Some(feeder) = feeder else {
        if let Some(id) = &requested {
            if !doc.players.contains_key(id) {
                return Err(ApiError::validation(format!("Invalid player ID '{id}'.")));
            }
        }
        return Ok(requested.or_else(|| current.slot_player(side).map(str::to_string)));
    };

    match (&requested, &feeder.winner_id) {
        (None, winner) => Ok(winner.clone()),
        (Some(id), Some(winner)) if id == winner => Ok(Some(id.clone())),
        (Some(_), _) => Err(ApiError::conflict(format!(
            "This slot is fed by {} slot {}; only its winner can play here.",
            feeder.round, feeder.slot
        ))),
    }
}

/// A season's rounds must form one unbroken range.
fn check_contiguous(doc: &Document, season: &str, round: Round) -> Result<(), ApiError> {
    let present: BTreeSet<Round> = doc
        .tournament_matches
        .values()
        .filter(|m| m.season == season)
        .map(|m| m.round)
        .collect();

    let (Some(first), Some(last)) = (present.first(), present.last()) else {
        return Ok(());
    };
    let adjacent = present.contains(&round)
        || first.previous() == Some(round)
        || last.next() == Some(round);
    if !adjacent {
        return Err(ApiError::validation(format!(
            "Round {round} would leave a gap in the bracket ({first} to {last} exist)."
        )));
    }
    Ok(())
}

/// Emptying a round that sits between two others would leave a gap.
fn check_round_removable(doc: &Document, removed: &TournamentMatch) -> Result<(), ApiError> {
    let present: BTreeSet<Round> = doc
        .tournament_matches
        .values()
        .filter(|m| m.season == removed.season)
        .map(|m| m.round)
        .collect();

    let still_present = present.contains(&removed.round);
    let earlier = present.iter().any(|r| *r < removed.round);
    let later = present.iter().any(|r| *r > removed.round);
    if !still_present && earlier && later {
        return Err(ApiError::conflict(format!(
            "Removing the last {} match would leave a gap in the bracket.",
            removed.round
        )));
    }
    Ok(())
}

/// A completed next-round match is frozen: nothing may change who sits in
/// the slot that `recorded` feeds.
fn check_downstream_open(
    doc: &Document,
    recorded: &TournamentMatch,
    previous_winner: Option<&str>,
) -> Result<(), ApiError> {
    let Some((round, slot, side)) = recorded.next_position() else {
        return Ok(());
    };
    let Some(next) = doc.tournament_match_at(&recorded.season, round, slot) else {
        return Ok(());
    };
    if next.status() != BracketStatus::Completed {
        return Ok(());
    }

    let occupant = next.slot_player(side);
    let after = match recorded.winner_id.as_deref() {
        Some(winner) => Some(winner),
        None if previous_winner.is_some() && occupant == previous_winner => None,
        None => occupant,
    };
    if after != occupant {
        return Err(ApiError::conflict(format!(
            "The {round} match this result feeds is already completed."
        )));
    }
    Ok(())
}

/// Write the winner into the next round, creating that match when needed.
/// A withdrawn result clears the slot it had filled.
fn advance(
    doc: &mut Document,
    recorded: &TournamentMatch,
    previous_winner: Option<&str>,
    now: DateTime<Utc>,
) -> Option<TournamentMatch> {
    let (round, slot, side) = recorded.next_position()?;

    let Some(winner) = recorded.winner_id.clone() else {
        if let (Some(previous), Some(next)) = (
            previous_winner,
            doc.tournament_match_at_mut(&recorded.season, round, slot),
        ) {
            if next.slot_player(side) == Some(previous) {
                next.set_slot_player(side, None);
                next.updated_at = Some(now);
                debug!(round = %round, slot, "Cleared withdrawn winner from next round");
            }
        }
        return None;
    };

    if let Some(next) = doc.tournament_match_at_mut(&recorded.season, round, slot) {
        if next.slot_player(side) != Some(winner.as_str()) {
            next.set_slot_player(side, Some(winner));
            next.updated_at = Some(now);
        }
        return Some(next.clone());
    }

    let mut next = TournamentMatch {
        id: new_id("t"),
        season: recorded.season.clone(),
        round,
        slot,
        player1_id: None,
        player2_id: None,
        winner_id: None,
        score: String::new(),
        date: None,
        created_at: now,
        updated_at: None,
    };
    next.set_slot_player(side, Some(winner));
    doc.tournament_matches.insert(next.id.clone(), next.clone());
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    const SEASON: &str = "2026-S1";

    async fn service(dir: &TempDir) -> TournamentService {
        let store = Arc::new(
            DocumentStore::load(&StorageConfig::new(dir.path().join("store.json")))
                .await
                .unwrap(),
        );
        store
            .with_transaction(|doc| {
                for id in ["p_1", "p_2", "p_3", "p_4", "p_5"] {
                    doc.players.insert(
                        id.to_string(),
                        Player {
                            id: id.to_string(),
                            display_name: format!("Player {id}"),
                            ntrp: "4.0".into(),
                            group: SkillGroup::D2,
                            country_code: String::new(),
                            phone: String::new(),
                            whatsapp_number: String::new(),
                            email: String::new(),
                            bio: String::new(),
                            profile: ProfileFields::new(),
                            registered_via_whatsapp: false,
                            tac_verified: true,
                            active: true,
                            created_at: Utc::now(),
                            updated_at: None,
                        },
                    );
                }
                Ok::<_, ApiError>(())
            })
            .await
            .unwrap();
        TournamentService::new(store, SEASON.into())
    }

    fn result(round: &str, slot: u32, p1: &str, p2: &str, winner: Option<&str>) -> RecordTournamentMatchRequest {
        RecordTournamentMatchRequest {
            season: SEASON.into(),
            round: round.into(),
            slot,
            player1_id: Some(p1.into()),
            player2_id: Some(p2.into()),
            winner_id: winner.map(str::to_string),
            score: winner.map(|_| "6-3, 6-4".to_string()),
            date: None,
        }
    }

    fn bye(round: &str, slot: u32, winner: Option<&str>) -> RecordTournamentMatchRequest {
        RecordTournamentMatchRequest {
            season: SEASON.into(),
            round: round.into(),
            slot,
            player1_id: None,
            player2_id: None,
            winner_id: winner.map(str::to_string),
            score: None,
            date: None,
        }
    }

    #[tokio::test]
    async fn test_semifinals_fill_the_final() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;

        let first = assert_ok!(service.record_result(result("SF", 0, "p_1", "p_2", Some("p_1"))).await);
        let final_match = first.advanced_to.unwrap();
        assert_eq!(final_match.round, Round::F);
        assert_eq!(final_match.player1_id.as_deref(), Some("p_1"));
        assert_eq!(final_match.status(), BracketStatus::Pending);

        let view = service.bracket(&TournamentQuery::default());
        let f = view.matches.iter().find(|m| m.match_data.round == Round::F).unwrap();
        assert_eq!(f.player2_name, "TBD");
        assert_eq!(f.status, BracketStatus::Pending);

        let second = assert_ok!(service.record_result(result("SF", 1, "p_3", "p_4", Some("p_4"))).await);
        let final_match = second.advanced_to.unwrap();
        assert_eq!(final_match.player1_id.as_deref(), Some("p_1"));
        assert_eq!(final_match.player2_id.as_deref(), Some("p_4"));
        assert_eq!(final_match.status(), BracketStatus::Ready);

        let view = service.bracket(&TournamentQuery::default());
        let rounds: Vec<(Round, u32)> = view.matches.iter().map(|m| (m.match_data.round, m.match_data.slot)).collect();
        assert_eq!(rounds, vec![(Round::SF, 0), (Round::SF, 1), (Round::F, 0)]);
        assert_eq!(view.matches[2].round_number, 5);
        assert_eq!(view.matches[2].player2_name, "Player p_4");
    }

    #[tokio::test]
    async fn test_fed_slot_accepts_only_feeder_winner() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        assert_ok!(service.record_result(result("SF", 0, "p_1", "p_2", None)).await);

        let err = assert_err!(service.record_result(result("F", 0, "p_1", "p_3", None)).await);
        assert!(matches!(err, ApiError::Conflict(_)));

        // Leaving the slot empty is fine and keeps it TBD.
        let outcome = assert_ok!(service.record_result(bye("F", 0, None)).await);
        assert!(outcome.recorded.player1_id.is_none());
    }

    #[tokio::test]
    async fn test_rounds_must_be_contiguous() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        assert_ok!(service.record_result(result("QF", 0, "p_1", "p_2", None)).await);

        let err = assert_err!(service.record_result(result("F", 0, "p_3", "p_4", None)).await);
        assert!(matches!(err, ApiError::ValidationError(_)));
        assert_ok!(service.record_result(result("R16", 0, "p_3", "p_4", None)).await);
        assert_ok!(service.record_result(result("SF", 1, "p_3", "p_5", None)).await);
    }

    #[tokio::test]
    async fn test_changing_result_after_next_round_completed_conflicts() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        assert_ok!(service.record_result(result("SF", 0, "p_1", "p_2", Some("p_1"))).await);
        assert_ok!(service.record_result(result("SF", 1, "p_3", "p_4", Some("p_3"))).await);
        assert_ok!(service.record_result(bye("F", 0, Some("p_3"))).await);

        let err = assert_err!(service.record_result(result("SF", 0, "p_1", "p_2", Some("p_2"))).await);
        assert!(matches!(err, ApiError::Conflict(_)));

        // Re-recording the same winner is not a change.
        assert_ok!(service.record_result(result("SF", 0, "p_1", "p_2", Some("p_1"))).await);
    }

    #[tokio::test]
    async fn test_late_feeder_cannot_rewrite_completed_final() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        assert_ok!(service.record_result(result("F", 0, "p_1", "p_2", Some("p_1"))).await);

        let err = assert_err!(service.record_result(result("SF", 0, "p_3", "p_4", Some("p_3"))).await);
        assert!(matches!(err, ApiError::Conflict(_)));

        let view = service.bracket(&TournamentQuery::default());
        assert_eq!(view.matches.len(), 1);
        let f = &view.matches[0].match_data;
        assert_eq!(f.player1_id.as_deref(), Some("p_1"));
        assert_eq!(f.winner_id.as_deref(), Some("p_1"));

        // A feeder that agrees with the final is accepted.
        let outcome = assert_ok!(service.record_result(result("SF", 0, "p_1", "p_3", Some("p_1"))).await);
        assert_eq!(outcome.advanced_to.unwrap().player1_id.as_deref(), Some("p_1"));
        assert_ok!(service.record_result(result("SF", 1, "p_2", "p_4", None)).await);
    }

    #[tokio::test]
    async fn test_delete_withdraws_advanced_winner() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        let semi = assert_ok!(service.record_result(result("SF", 0, "p_1", "p_2", Some("p_1"))).await);

        assert_ok!(service.delete(&semi.recorded.id).await);
        let view = service.bracket(&TournamentQuery::default());
        assert_eq!(view.matches.len(), 1);
        assert!(view.matches[0].match_data.player1_id.is_none());
        assert_eq!(view.matches[0].player1_name, "TBD");
    }

    #[tokio::test]
    async fn test_delete_refused_when_final_already_played() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        let semi = assert_ok!(service.record_result(result("SF", 0, "p_1", "p_2", Some("p_1"))).await);
        assert_ok!(service.record_result(result("SF", 1, "p_3", "p_4", Some("p_3"))).await);
        assert_ok!(service.record_result(bye("F", 0, Some("p_1"))).await);

        let err = assert_err!(service.delete(&semi.recorded.id).await);
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(service.store.snapshot().tournament_matches.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_refused_when_it_splits_rounds() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        assert_ok!(service.record_result(result("QF", 0, "p_1", "p_2", None)).await);
        let semi = assert_ok!(service.record_result(result("SF", 1, "p_3", "p_4", None)).await);
        let last = assert_ok!(service.record_result(bye("F", 0, None)).await);

        let err = assert_err!(service.delete(&semi.recorded.id).await);
        assert!(matches!(err, ApiError::Conflict(_)));

        assert_ok!(service.delete(&last.recorded.id).await);
        assert_ok!(service.delete(&semi.recorded.id).await);
    }

    #[tokio::test]
    async fn test_corrected_result_replaces_advanced_player() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        assert_ok!(service.record_result(result("SF", 0, "p_1", "p_2", Some("p_1"))).await);

        let corrected = assert_ok!(service.record_result(result("SF", 0, "p_1", "p_2", Some("p_2"))).await);
        assert_eq!(corrected.advanced_to.unwrap().player1_id.as_deref(), Some("p_2"));

        let withdrawn = assert_ok!(service.record_result(result("SF", 0, "p_1", "p_2", None)).await);
        assert!(withdrawn.advanced_to.is_none());
        let view = service.bracket(&TournamentQuery::default());
        let f = view.matches.iter().find(|m| m.match_data.round == Round::F).unwrap();
        assert!(f.match_data.player1_id.is_none());
        assert_eq!(view.matches.len(), 2);
    }

    #[tokio::test]
    async fn test_request_validation() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;

        let cases = [
            result("R64", 0, "p_1", "p_2", None),
            result("SF", 2, "p_1", "p_2", None),
            result("SF", 0, "p_1", "p_1", None),
            result("SF", 0, "p_1", "p_9", None),
            result("SF", 0, "p_1", "p_2", Some("p_3")),
            RecordTournamentMatchRequest {
                player2_id: None,
                ..result("SF", 0, "p_1", "p_2", Some("p_1"))
            },
        ];
        for case in cases {
            let err = assert_err!(service.record_result(case).await);
            assert!(matches!(err, ApiError::ValidationError(_)), "{err:?}");
        }
        assert!(service.store.snapshot().tournament_matches.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_keeps_identity_and_delete() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        let first = assert_ok!(service.record_result(result("F", 0, "p_1", "p_2", None)).await);
        let second = assert_ok!(service.record_result(result("F", 0, "p_1", "p_2", Some("p_2"))).await);

        assert_eq!(first.recorded.id, second.recorded.id);
        assert!(second.advanced_to.is_none());
        assert_eq!(second.recorded.status(), BracketStatus::Completed);

        assert_ok!(service.delete(&first.recorded.id).await);
        let err = assert_err!(service.delete(&first.recorded.id).await);
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
