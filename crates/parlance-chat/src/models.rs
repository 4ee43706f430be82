//! Typed records persisted in the document store.
//!
//! Field names are camelCase on the wire and timestamps are stored as epoch
//! milliseconds, so the store orders them numerically.  Records are
//! validated when they are read; anything that does not fit its shape is
//! reported as malformed rather than patched up.

use std::collections::BTreeMap;

use chrono::serde::{ts_milliseconds, ts_milliseconds_option};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use parlance_shared::constants::SYSTEM_SENDER;
use parlance_shared::{GroupId, Language, MessageId, ReportId, RoomId, UserId};
use parlance_store::{Snapshot, StoreError};

/// A record that lives in its own document.  The document id is not part of
/// the stored fields and is restored from the snapshot path on read.
pub trait Record: Serialize + DeserializeOwned {
    fn set_id(&mut self, id: &str);

    /// Structural checks beyond what serde enforces.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// The current time at the precision timestamps are stored with.
pub fn now_ms() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}

/// Decode and validate a snapshot.
pub fn decode<T: Record>(snapshot: &Snapshot) -> std::result::Result<T, StoreError> {
    let mut record: T = snapshot.decode()?;
    record.set_id(snapshot.id());
    record.validate().map_err(|reason| StoreError::Malformed {
        path: snapshot.path.to_string(),
        reason,
    })?;
    Ok(record)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip)]
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub language: Language,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(default)]
    pub ads_removed: bool,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub login_streak: i64,
    #[serde(default)]
    pub longest_streak: i64,
    #[serde(default)]
    pub last_login_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_messages: i64,
    #[serde(default)]
    pub total_chats: i64,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A fresh profile with zeroed counters.
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        display_name: impl Into<String>,
        language: Language,
    ) -> Self {
        let now = now_ms();
        Self {
            id,
            username: username.into(),
            display_name: display_name.into(),
            language,
            device_id: String::new(),
            deleted: false,
            push_token: None,
            ads_removed: false,
            points: 0,
            login_streak: 0,
            longest_streak: 0,
            last_login_date: None,
            total_messages: 0,
            total_chats: 0,
            badges: Vec::new(),
            bio: None,
            interests: Vec::new(),
            last_active_at: Some(now),
            created_at: now,
        }
    }
}

impl Record for User {
    fn set_id(&mut self, id: &str) {
        self.id = UserId(id.to_string());
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.display_name.trim().is_empty() {
            return Err("user has no display name".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chat rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RoomStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Pending => "pending",
            RoomStatus::Accepted => "accepted",
            RoomStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display data for one participant, denormalized into the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub display_name: String,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    #[serde(skip)]
    pub id: RoomId,
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub participants_info: BTreeMap<UserId, ParticipantInfo>,
    pub status: RoomStatus,
    pub requested_by: UserId,
    #[serde(default)]
    pub unread: BTreeMap<UserId, i64>,
    #[serde(default)]
    pub last_message: String,
    #[serde(default, with = "ts_milliseconds_option")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl ChatRoom {
    /// A pending request from `requester` to `recipient`.
    pub fn request(requester: &User, recipient: &User, now: DateTime<Utc>) -> Self {
        let mut participants_info = BTreeMap::new();
        let mut unread = BTreeMap::new();
        for user in [requester, recipient] {
            participants_info.insert(
                user.id.clone(),
                ParticipantInfo {
                    display_name: user.display_name.clone(),
                    language: user.language,
                },
            );
            unread.insert(user.id.clone(), 0);
        }

        Self {
            id: RoomId::default(),
            participants: vec![requester.id.clone(), recipient.id.clone()],
            participants_info,
            status: RoomStatus::Pending,
            requested_by: requester.id.clone(),
            unread,
            last_message: String::new(),
            last_message_at: Some(now),
            created_at: now,
            requested_at: Some(now),
            accepted_at: None,
            rejected_at: None,
        }
    }

    pub fn is_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }

    /// The other participant, if `user` is one of the two.
    pub fn counterpart(&self, user: &UserId) -> Option<&UserId> {
        if !self.is_participant(user) {
            return None;
        }
        self.participants.iter().find(|p| *p != user)
    }

    pub fn involves_pair(&self, a: &UserId, b: &UserId) -> bool {
        self.is_participant(a) && self.is_participant(b)
    }

    pub fn unread_for(&self, user: &UserId) -> i64 {
        self.unread.get(user).copied().unwrap_or(0)
    }
}

impl Record for ChatRoom {
    fn set_id(&mut self, id: &str) {
        self.id = RoomId(id.to_string());
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.participants.len() != 2 {
            return Err(format!(
                "room has {} participants, expected 2",
                self.participants.len()
            ));
        }
        if self.participants[0] == self.participants[1] {
            return Err("room participants are not distinct".into());
        }
        if !self.is_participant(&self.requested_by) {
            return Err(format!("requester {} is not a participant", self.requested_by));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(skip)]
    pub id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub text: String,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Record for Message {
    fn set_id(&mut self, id: &str) {
        self.id = MessageId(id.to_string());
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Entry in a user's block list, keyed by the blocked user's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub blocked_user_id: UserId,
    #[serde(default)]
    pub blocked_user_name: String,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Record for BlockRecord {
    fn set_id(&mut self, id: &str) {
        if self.blocked_user_id.as_str().is_empty() {
            self.blocked_user_id = UserId(id.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Group chats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupTopic {
    Daily,
    Hobbies,
    Travel,
    Food,
    Sports,
    Music,
    Movies,
    Books,
}

impl GroupTopic {
    pub const ALL: [GroupTopic; 8] = [
        GroupTopic::Daily,
        GroupTopic::Hobbies,
        GroupTopic::Travel,
        GroupTopic::Food,
        GroupTopic::Sports,
        GroupTopic::Music,
        GroupTopic::Movies,
        GroupTopic::Books,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GroupTopic::Daily => "daily",
            GroupTopic::Hobbies => "hobbies",
            GroupTopic::Travel => "travel",
            GroupTopic::Food => "food",
            GroupTopic::Sports => "sports",
            GroupTopic::Music => "music",
            GroupTopic::Movies => "movies",
            GroupTopic::Books => "books",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            GroupTopic::Daily => "💬",
            GroupTopic::Hobbies => "🎨",
            GroupTopic::Travel => "✈️",
            GroupTopic::Food => "🍔",
            GroupTopic::Sports => "⚽",
            GroupTopic::Music => "🎵",
            GroupTopic::Movies => "🎬",
            GroupTopic::Books => "📚",
        }
    }

    /// The topic's display name in `language`.
    pub fn name(self, language: Language) -> &'static str {
        use GroupTopic::*;
        use Language::*;
        match (self, language) {
            (Daily, En) => "Daily Conversation",
            (Daily, Es) => "Conversación Diaria",
            (Daily, Zh) => "日常对话",
            (Daily, Ja) => "日常会話",
            (Daily, Ko) => "일상 대화",
            (Hobbies, En) => "Hobbies",
            (Hobbies, Es) => "Pasatiempos",
            (Hobbies, Zh) => "爱好",
            (Hobbies, Ja) => "趣味",
            (Hobbies, Ko) => "취미",
            (Travel, En) => "Travel",
            (Travel, Es) => "Viajes",
            (Travel, Zh | Ja) => "旅行",
            (Travel, Ko) => "여행",
            (Food, En) => "Food & Cooking",
            (Food, Es) => "Comida y Cocina",
            (Food, Zh) => "美食与烹饪",
            (Food, Ja) => "料理",
            (Food, Ko) => "음식과 요리",
            (Sports, En) => "Sports",
            (Sports, Es) => "Deportes",
            (Sports, Zh) => "运动",
            (Sports, Ja) => "スポーツ",
            (Sports, Ko) => "스포츠",
            (Music, En) => "Music",
            (Music, Es) => "Música",
            (Music, Zh) => "音乐",
            (Music, Ja) => "音楽",
            (Music, Ko) => "음악",
            (Movies, En) => "Movies & TV",
            (Movies, Es) => "Películas y TV",
            (Movies, Zh) => "电影与电视",
            (Movies, Ja) => "映画・テレビ",
            (Movies, Ko) => "영화와 TV",
            (Books, En) => "Books",
            (Books, Es) => "Libros",
            (Books, Zh) => "书籍",
            (Books, Ja) => "本",
            (Books, Ko) => "책",
        }
    }
}

impl std::fmt::Display for GroupTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open, topic-based group chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupChat {
    #[serde(skip)]
    pub id: GroupId,
    pub name: String,
    pub topic: GroupTopic,
    /// Topic name in the creator's language at creation time.
    #[serde(default)]
    pub topic_name: String,
    pub created_by: UserId,
    pub members: Vec<UserId>,
    #[serde(default)]
    pub member_count: i64,
    #[serde(default)]
    pub last_message: String,
    #[serde(with = "ts_milliseconds")]
    pub last_message_at: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl GroupChat {
    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }
}

impl Record for GroupChat {
    fn set_id(&mut self, id: &str) {
        self.id = GroupId(id.to_string());
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("group has no name".into());
        }
        Ok(())
    }
}

/// A message in a group chat.  Unlike room messages it carries the sender's
/// language, which is used as the source language when translating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    #[serde(skip)]
    pub id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    #[serde(default)]
    pub sender_language: Language,
    pub text: String,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl GroupMessage {
    /// Posted by the app rather than a member.
    pub fn is_system(&self) -> bool {
        self.sender_id.as_str() == SYSTEM_SENDER
    }
}

impl Record for GroupMessage {
    fn set_id(&mut self, id: &str) {
        self.id = MessageId(id.to_string());
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportReason {
    Harassment,
    Inappropriate,
    Spam,
    Hate,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Pending,
    Reviewed,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(skip)]
    pub id: ReportId,
    pub reporter_id: UserId,
    pub reporter_name: String,
    pub reported_user_id: UserId,
    pub reported_user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_room_id: Option<RoomId>,
    pub reason: ReportReason,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Record for Report {
    fn set_id(&mut self, id: &str) {
        self.id = ReportId(id.to_string());
    }
}
