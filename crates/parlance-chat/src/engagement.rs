//! Engagement counters, daily missions and login streaks.
//!
//! Messaging and room creation report activity here on a best-effort basis:
//! a failed counter update is logged and never fails the operation that
//! triggered it.

use std::collections::BTreeMap;

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use parlance_shared::constants::USER_MISSIONS;
use parlance_shared::UserId;
use parlance_store::{to_fields, DocPath, FieldPath, FieldUpdate};

use crate::error::{ChatError, Result};
use crate::models::{decode, Record};
use crate::records::{user_path, Records};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionType {
    SendMessages,
    StartChats,
    LoginStreak,
    InviteFriends,
}

/// What completing a mission pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reward {
    pub points: i64,
    pub badge: Option<&'static str>,
}

impl MissionType {
    pub const ALL: [MissionType; 4] = [
        MissionType::SendMessages,
        MissionType::StartChats,
        MissionType::LoginStreak,
        MissionType::InviteFriends,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MissionType::SendMessages => "send_messages",
            MissionType::StartChats => "start_chats",
            MissionType::LoginStreak => "login_streak",
            MissionType::InviteFriends => "invite_friends",
        }
    }

    pub fn target(self) -> i64 {
        match self {
            MissionType::SendMessages => 10,
            MissionType::StartChats => 3,
            MissionType::LoginStreak => 1,
            MissionType::InviteFriends => 1,
        }
    }

    pub fn reward(self) -> Reward {
        match self {
            MissionType::SendMessages => Reward { points: 10, badge: None },
            MissionType::StartChats => Reward { points: 20, badge: Some("chat_starter") },
            MissionType::LoginStreak => Reward { points: 5, badge: None },
            MissionType::InviteFriends => Reward { points: 50, badge: Some("inviter") },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionProgress {
    pub progress: i64,
    pub completed: bool,
    pub reward_claimed: bool,
}

/// One user's missions for one UTC day, at `userMissions/{uid}_{date}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMissions {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub missions: BTreeMap<MissionType, MissionProgress>,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl DailyMissions {
    fn fresh(user: &UserId, date: NaiveDate) -> Self {
        Self {
            user_id: user.clone(),
            date,
            missions: MissionType::ALL
                .iter()
                .map(|m| (*m, MissionProgress::default()))
                .collect(),
            created_at: Utc::now(),
        }
    }

    pub fn get(&self, mission: MissionType) -> MissionProgress {
        self.missions.get(&mission).cloned().unwrap_or_default()
    }
}

impl Record for DailyMissions {
    fn set_id(&mut self, _id: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed(Reward),
    NotCompleted,
    AlreadyClaimed,
}

fn missions_path(user: &UserId, date: NaiveDate) -> DocPath {
    DocPath::new(USER_MISSIONS, format!("{}_{}", user, date.format("%Y-%m-%d")))
}

fn mission_field(mission: MissionType, field: &str) -> FieldPath {
    FieldPath::new(["missions", mission.as_str(), field])
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Clone)]
pub struct Engagement {
    records: Records,
}

impl Engagement {
    pub fn new(records: Records) -> Self {
        Self { records }
    }

    // ------------------------------------------------------------------
    // Activity hooks
    // ------------------------------------------------------------------

    /// A room request was created by `user`.
    pub async fn record_chat_started(&self, user: &UserId) {
        if let Err(e) = self.bump(user, "totalChats", MissionType::StartChats).await {
            warn!(user = %user, error = %e, "Failed to record chat start");
        }
    }

    /// `user` sent a message.
    pub async fn record_message_sent(&self, user: &UserId) {
        if let Err(e) = self.bump(user, "totalMessages", MissionType::SendMessages).await {
            warn!(user = %user, error = %e, "Failed to record message");
        }
    }

    async fn bump(&self, user: &UserId, counter: &str, mission: MissionType) -> Result<()> {
        self.records
            .store()
            .update(
                &user_path(user),
                vec![
                    FieldUpdate::increment(counter, 1),
                    FieldUpdate::set("lastActiveAt", Utc::now().timestamp_millis()),
                ],
            )
            .await?;
        self.record_progress_on(user, mission, 1, today()).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Missions
    // ------------------------------------------------------------------

    pub async fn missions_for(&self, user: &UserId, date: NaiveDate) -> Result<DailyMissions> {
        let path = missions_path(user, date);
        if let Some(snap) = self.records.store().get(&path).await? {
            return Ok(decode(&snap)?);
        }
        let missions = DailyMissions::fresh(user, date);
        self.records.store().set(&path, to_fields(&missions)?).await?;
        debug!(user = %user, %date, "Created daily missions");
        Ok(missions)
    }

    pub async fn record_progress(
        &self,
        user: &UserId,
        mission: MissionType,
        by: i64,
    ) -> Result<MissionProgress> {
        self.record_progress_on(user, mission, by, today()).await
    }

    /// Advance a mission, capped at its target.
    pub async fn record_progress_on(
        &self,
        user: &UserId,
        mission: MissionType,
        by: i64,
        date: NaiveDate,
    ) -> Result<MissionProgress> {
        let missions = self.missions_for(user, date).await?;
        let mut progress = missions.get(mission);
        if progress.completed {
            return Ok(progress);
        }

        progress.progress = (progress.progress + by).min(mission.target());
        progress.completed = progress.progress >= mission.target();

        self.records
            .store()
            .update(
                &missions_path(user, date),
                vec![
                    FieldUpdate::set(mission_field(mission, "progress"), progress.progress),
                    FieldUpdate::set(mission_field(mission, "completed"), progress.completed),
                ],
            )
            .await?;

        if progress.completed {
            info!(user = %user, mission = mission.as_str(), "Mission completed");
        }
        Ok(progress)
    }

    /// Pay out a completed mission once.
    pub async fn claim_reward(
        &self,
        user: &UserId,
        mission: MissionType,
        date: NaiveDate,
    ) -> Result<ClaimOutcome> {
        let missions = self.missions_for(user, date).await?;
        let progress = missions.get(mission);
        if !progress.completed {
            return Ok(ClaimOutcome::NotCompleted);
        }
        if progress.reward_claimed {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }

        let reward = mission.reward();
        let profile = self.records.require_user(user).await?;
        let mut updates = vec![FieldUpdate::increment("points", reward.points)];
        if let Some(badge) = reward.badge {
            if !profile.badges.iter().any(|b| b == badge) {
                let mut badges = profile.badges.clone();
                badges.push(badge.to_string());
                updates.push(FieldUpdate::set("badges", badges));
            }
        }
        self.records.store().update(&user_path(user), updates).await?;
        self.records
            .store()
            .update(
                &missions_path(user, date),
                vec![FieldUpdate::set(mission_field(mission, "rewardClaimed"), true)],
            )
            .await?;

        info!(user = %user, mission = mission.as_str(), points = reward.points, "Reward claimed");
        Ok(ClaimOutcome::Claimed(reward))
    }

    // ------------------------------------------------------------------
    // Login streak
    // ------------------------------------------------------------------

    /// Record a login on `today` and return the resulting streak.
    ///
    /// A login the day after the previous one extends the streak, a second
    /// login on the same day leaves it alone, anything else restarts it.
    pub async fn update_login_streak(&self, user: &UserId, today: NaiveDate) -> Result<i64> {
        let profile = self.records.require_user(user).await?;
        if profile.deleted {
            return Err(ChatError::AccountDeleted(user.clone()));
        }

        let streak = match profile.last_login_date {
            Some(last) if last == today => profile.login_streak.max(1),
            Some(last) if today.pred_opt() == Some(last) => profile.login_streak + 1,
            _ => 1,
        };
        let longest = profile.longest_streak.max(streak);

        self.records
            .store()
            .update(
                &user_path(user),
                vec![
                    FieldUpdate::set("loginStreak", streak),
                    FieldUpdate::set("longestStreak", longest),
                    FieldUpdate::set("lastLoginDate", today.format("%Y-%m-%d").to_string()),
                    FieldUpdate::set("lastActiveAt", Utc::now().timestamp_millis()),
                ],
            )
            .await?;

        if profile.last_login_date != Some(today) {
            self.record_progress_on(user, MissionType::LoginStreak, 1, today)
                .await?;
        }
        debug!(user = %user, streak, longest, "Login recorded");
        Ok(streak)
    }
}
