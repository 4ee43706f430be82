//! Fixtures shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use parlance_shared::constants::CHAT_ROOMS;
use parlance_shared::{Language, RoomId, UserId};
use parlance_store::{to_fields, Database};

use crate::models::{ChatRoom, RoomStatus, User};
use crate::push::{PushError, PushNotification, PushNotifier};
use crate::records::{user_path, Records};
use crate::translation::{TranslationError, TranslationProvider};

pub fn memory_records() -> Records {
    Records::new(Arc::new(Database::open_in_memory().unwrap()))
}

/// Store a profile whose display name is the upper-cased id.
pub async fn put_user(records: &Records, id: &str, language: Language) -> User {
    let user = User::new(UserId(id.into()), id, id.to_uppercase(), language);
    save_user(records, &user).await;
    user
}

pub async fn save_user(records: &Records, user: &User) {
    records
        .store()
        .set(&user_path(&user.id), to_fields(user).unwrap())
        .await
        .unwrap();
}

pub async fn put_accepted_room(records: &Records, a: &User, b: &User) -> RoomId {
    let mut room = ChatRoom::request(a, b, Utc::now());
    room.status = RoomStatus::Accepted;
    room.accepted_at = Some(Utc::now());
    let id = records
        .store()
        .add(CHAT_ROOMS, to_fields(&room).unwrap())
        .await
        .unwrap();
    RoomId(id)
}

/// Always answers with the same text, counts calls and remembers the
/// language pairs it was asked for.
#[derive(Clone)]
pub struct FixedProvider {
    reply: String,
    calls: Arc<AtomicUsize>,
    pairs: Arc<Mutex<Vec<(Language, Language)>>>,
}

impl FixedProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            pairs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pairs(&self) -> Vec<(Language, Language)> {
        self.pairs.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranslationProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn translate(
        &self,
        _text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pairs.lock().unwrap().push((source, target));
        Ok(self.reply.clone())
    }
}

pub struct FailingProvider;

#[async_trait]
impl TranslationProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn translate(
        &self,
        _text: &str,
        _source: Language,
        _target: Language,
    ) -> Result<String, TranslationError> {
        Err(TranslationError::Empty)
    }
}

/// Keeps every notification it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<PushNotification>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<PushNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushNotifier for RecordingNotifier {
    async fn send(&self, notification: &PushNotification) -> Result<(), PushError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
