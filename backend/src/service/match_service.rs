use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::api_error::ApiError;
use crate::db::DocumentStore;
use crate::models::*;

/// League matches: listing, recording and correcting results.
pub struct MatchService {
    store: Arc<DocumentStore>,
    default_season: String,
}

/// A match request with every field resolved, ready to be checked.
struct MatchDraft {
    season: String,
    stage: String,
    date: NaiveDate,
    scheduled_at: Option<DateTime<Utc>>,
    player_a_id: String,
    player_b_id: String,
    score: String,
    winner_id: Option<String>,
    status: MatchStatus,
}

impl MatchService {
    pub fn new(store: Arc<DocumentStore>, default_season: String) -> Self {
        Self {
            store,
            default_season,
        }
    }

    pub fn default_season(&self) -> &str {
        &self.default_season
    }

    /// Matches of a season (default season when unset), newest first.
    pub fn list(&self, query: &MatchQuery) -> Vec<MatchView> {
        let doc = self.store.snapshot();
        let season = non_blank(query.season.as_deref()).unwrap_or_else(|| self.default_season.clone());
        let stage = non_blank(query.stage.as_deref()).map(|s| s.to_uppercase());

        let mut matches: Vec<&Match> = doc
            .matches
            .values()
            .filter(|m| m.season == season)
            .filter(|m| stage.as_ref().map_or(true, |stage| &m.stage == stage))
            .collect();
        sort_newest_first(&mut matches);

        matches.into_iter().map(|m| enrich_match(&doc, m)).collect()
    }

    pub async fn create(
        &self,
        request: MatchRequest,
        origin: MatchOrigin,
    ) -> Result<MatchView, ApiError> {
        request.validate()?;
        let now = Utc::now();
        let draft = self.draft(request, now.date_naive());

        let (created, view) = self
            .store
            .with_transaction(|doc| {
                let winner_id = check_draft(doc, &draft)?;
                let created = Match {
                    id: new_id("m"),
                    season: draft.season,
                    stage: draft.stage,
                    date: draft.date,
                    scheduled_at: draft.scheduled_at,
                    player_a_id: draft.player_a_id,
                    player_b_id: draft.player_b_id,
                    score: draft.score,
                    winner_id,
                    status: draft.status,
                    created_by: origin,
                    created_at: now,
                    updated_at: None,
                };
                doc.matches.insert(created.id.clone(), created.clone());
                let view = enrich_match(doc, &created);
                Ok::<_, ApiError>((created, view))
            })
            .await?;

        info!(
            match_id = %created.id,
            season = %created.season,
            status = %created.status,
            origin = ?origin,
            "Match recorded"
        );
        Ok(view)
    }

    /// Replace the fields present in `request`; the rest keep their current value.
    pub async fn update(&self, match_id: &str, request: MatchRequest) -> Result<MatchView, ApiError> {
        request.validate()?;
        let now = Utc::now();

        let view = self
            .store
            .with_transaction(|doc| {
                let current = doc
                    .matches
                    .get(match_id)
                    .cloned()
                    .ok_or_else(|| ApiError::not_found("Match not found."))?;

                let draft = merge(&current, request);
                let winner_id = check_draft(doc, &draft)?;

                let updated = Match {
                    season: draft.season,
                    stage: draft.stage,
                    date: draft.date,
                    scheduled_at: draft.scheduled_at,
                    player_a_id: draft.player_a_id,
                    player_b_id: draft.player_b_id,
                    score: draft.score,
                    winner_id,
                    status: draft.status,
                    updated_at: Some(now),
                    ..current
                };
                doc.matches.insert(updated.id.clone(), updated.clone());
                Ok::<_, ApiError>(enrich_match(doc, &updated))
            })
            .await?;

        info!(match_id = %match_id, "Match updated");
        Ok(view)
    }

    pub async fn delete(&self, match_id: &str) -> Result<(), ApiError> {
        self.store
            .with_transaction(|doc| {
                doc.matches
                    .remove(match_id)
                    .map(|_| ())
                    .ok_or_else(|| ApiError::not_found("Match not found."))
            })
            .await?;

        info!(match_id = %match_id, "Match deleted");
        Ok(())
    }

    fn draft(&self, request: MatchRequest, today: NaiveDate) -> MatchDraft {
        MatchDraft {
            season: non_blank(request.season.as_deref())
                .unwrap_or_else(|| self.default_season.clone()),
            stage: non_blank(request.stage.as_deref())
                .map(|s| s.to_uppercase())
                .unwrap_or_else(|| REGULAR_STAGE.to_string()),
            date: request.date.unwrap_or(today),
            scheduled_at: request.scheduled_at,
            player_a_id: non_blank(request.player_a_id.as_deref()).unwrap_or_default(),
            player_b_id: non_blank(request.player_b_id.as_deref()).unwrap_or_default(),
            score: non_blank(request.score.as_deref()).unwrap_or_default(),
            winner_id: non_blank(request.winner_id.as_deref()),
            status: request.status.unwrap_or(MatchStatus::Completed),
        }
    }
}

/// Overlay an update on the stored match.
///
/// A new score or status without an explicit winner drops the stored winner,
/// so it is derived again (or cleared) instead of contradicting the new result.
fn merge(current: &Match, request: MatchRequest) -> MatchDraft {
    let result_changed = request.score.is_some() || request.status.is_some();
    let winner_id = match request.winner_id.as_deref() {
        Some(winner) => non_blank(Some(winner)),
        None if result_changed => None,
        None => current.winner_id.clone(),
    };

    MatchDraft {
        season: non_blank(request.season.as_deref()).unwrap_or_else(|| current.season.clone()),
        stage: non_blank(request.stage.as_deref())
            .map(|s| s.to_uppercase())
            .unwrap_or_else(|| current.stage.clone()),
        date: request.date.unwrap_or(current.date),
        scheduled_at: request.scheduled_at.or(current.scheduled_at),
        player_a_id: non_blank(request.player_a_id.as_deref())
            .unwrap_or_else(|| current.player_a_id.clone()),
        player_b_id: non_blank(request.player_b_id.as_deref())
            .unwrap_or_else(|| current.player_b_id.clone()),
        score: request
            .score
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| current.score.clone()),
        winner_id,
        status: request.status.unwrap_or(current.status),
    }
}

/// Check references and the result; returns the winner to store.
fn check_draft(doc: &Document, draft: &MatchDraft) -> Result<Option<String>, ApiError> {
    if draft.player_a_id.is_empty() || draft.player_b_id.is_empty() {
        return Err(ApiError::validation("Both players are required."));
    }
    if draft.player_a_id == draft.player_b_id {
        return Err(ApiError::validation("Players must be different."));
    }
    for id in [&draft.player_a_id, &draft.player_b_id] {
        if !doc.players.contains_key(id) {
            return Err(ApiError::validation(format!("Invalid player ID '{id}'.")));
        }
    }

    settle_winner(draft)
}

fn settle_winner(draft: &MatchDraft) -> Result<Option<String>, ApiError> {
    if draft.status != MatchStatus::Completed {
        if draft.winner_id.is_some() {
            return Err(ApiError::validation(format!(
                "A {} match cannot have a winner.",
                draft.status
            )));
        }
        return Ok(None);
    }

    if draft.score.is_empty() {
        return Err(ApiError::validation("Score is required."));
    }
    let sets = parse_score(&draft.score).map_err(ApiError::ValidationError)?;
    let derived = winning_side(&sets).map(|side| match side {
        Side::A => draft.player_a_id.clone(),
        Side::B => draft.player_b_id.clone(),
    });

    match (&draft.winner_id, derived) {
        (Some(winner), _) if winner != &draft.player_a_id && winner != &draft.player_b_id => Err(
            ApiError::validation("Winner must be one of the selected players."),
        ),
        (Some(winner), Some(derived)) if winner != &derived => Err(ApiError::validation(
            "Winner does not match the score.",
        )),
        (Some(winner), _) => Ok(Some(winner.clone())),
        (None, Some(derived)) => Ok(Some(derived)),
        (None, None) => Err(ApiError::validation(
            "Score does not decide a winner; winner_id is required.",
        )),
    }
}

pub(crate) fn sort_newest_first(matches: &mut [&Match]) {
    matches.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Attach display names; dangling references read "Unknown", an undecided result "TBD".
pub fn enrich_match(doc: &Document, m: &Match) -> MatchView {
    let result_name = |id: Option<&str>| match id {
        Some(id) => doc.player_name(Some(id), "Unknown"),
        None => "TBD".to_string(),
    };

    MatchView {
        player_a_name: doc.player_name(Some(&m.player_a_id), "Unknown"),
        player_b_name: doc.player_name(Some(&m.player_b_id), "Unknown"),
        winner_name: result_name(m.winner_id.as_deref()),
        loser_name: result_name(m.loser_id()),
        match_data: m.clone(),
    }
}
