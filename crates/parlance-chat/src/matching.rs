//! Partner suggestions for language exchange.
//!
//! Candidates speak a different language from the viewer and are scored on
//! how active and how complete their profile is.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use parlance_shared::constants::{MATCH_CANDIDATE_POOL, USERS};
use parlance_shared::UserId;
use parlance_store::{Direction, Filter, Query};

use crate::error::{ChatError, Result};
use crate::models::User;
use crate::records::{decode_all, Records};
use crate::trust::TrustStore;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub user: User,
    pub score: u32,
}

/// Score `candidate` for `viewer` at time `now`.
pub fn match_score(viewer: &User, candidate: &User, now: DateTime<Utc>) -> u32 {
    let mut score = 0;

    if candidate.language != viewer.language {
        score += 40;
    }

    if let Some(active) = candidate.last_active_at {
        let idle = now - active;
        score += if idle < Duration::hours(1) {
            30
        } else if idle < Duration::hours(6) {
            20
        } else if idle < Duration::hours(24) {
            10
        } else {
            0
        };
    }

    score += match candidate.total_messages {
        n if n > 100 => 15,
        n if n > 50 => 10,
        n if n > 10 => 5,
        _ => 0,
    };

    score += match candidate.login_streak {
        n if n >= 7 => 10,
        n if n >= 3 => 5,
        _ => 0,
    };

    let has_bio = candidate
        .bio
        .as_deref()
        .is_some_and(|bio| !bio.trim().is_empty());
    if has_bio || !candidate.interests.is_empty() {
        score += 5;
    }

    score
}

#[derive(Clone)]
pub struct Matchmaker {
    records: Records,
    trust: TrustStore,
}

impl Matchmaker {
    pub fn new(records: Records, trust: TrustStore) -> Self {
        Self { records, trust }
    }

    /// The best `limit` partners for `viewer`, highest score first.
    pub async fn find_matches(&self, viewer_id: &UserId, limit: usize) -> Result<Vec<MatchCandidate>> {
        let viewer = self.records.require_user(viewer_id).await?;
        if viewer.deleted {
            return Err(ChatError::AccountDeleted(viewer_id.clone()));
        }
        let blocked = self.trust.list_blocked(viewer_id).await?;

        let pool = Query::collection(USERS)
            .filter(Filter::eq("deleted", false))
            .order_by("lastActiveAt", Direction::Descending)
            .limit(MATCH_CANDIDATE_POOL);
        let users: Vec<User> = decode_all(&self.records.store().query(&pool).await?);

        let now = Utc::now();
        let mut candidates = Vec::new();
        for user in users {
            if user.id == viewer.id
                || user.language == viewer.language
                || blocked.contains(&user.id)
                || self.trust.is_blocked(&user.id, viewer_id).await?
            {
                continue;
            }
            candidates.push(MatchCandidate {
                score: match_score(&viewer, &user, now),
                user,
            });
        }

        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates.truncate(limit);
        debug!(user = %viewer_id, matches = candidates.len(), "Matches computed");
        Ok(candidates)
    }
}
