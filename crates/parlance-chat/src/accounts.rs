//! Profiles: signup, loading, push-token registration and account removal.

use std::time::Duration;

use tracing::{debug, info, warn};

use parlance_shared::constants::USERS;
use parlance_shared::{Language, UserId};
use parlance_store::{to_fields, FieldUpdate, Filter, Query, StoreError};

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::models::{now_ms, User};
use crate::records::{user_path, Records};
use crate::trust::{blocked_query, TrustStore};

#[derive(Debug, Clone)]
pub struct SignupRequest {
    /// Id issued by the auth provider.
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
    pub language: Language,
    pub device_id: String,
}

/// What [`AccountService::delete_account`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountDeletion {
    pub rooms: usize,
    pub messages: usize,
    pub blocks: usize,
}

#[derive(Clone)]
pub struct AccountService {
    records: Records,
    trust: TrustStore,
    load_attempts: u32,
    retry_delay: Duration,
}

impl AccountService {
    pub fn new(records: Records, trust: TrustStore, config: &ChatConfig) -> Self {
        Self {
            records,
            trust,
            load_attempts: config.profile_load_attempts.max(1),
            retry_delay: config.profile_retry_delay,
        }
    }

    async fn field_in_use(&self, field: &'static str, value: &str) -> Result<bool> {
        let query = Query::collection(USERS).filter(Filter::eq(field, value)).limit(1);
        Ok(!self.records.store().query(&query).await?.is_empty())
    }

    /// Create a profile.  Username and display name must both be unused.
    pub async fn signup(&self, request: SignupRequest) -> Result<User> {
        let user_id = UserId::parse(request.user_id.as_str())
            .map_err(|e| ChatError::InvalidRequest(e.to_string()))?;
        let username = request.username.trim();
        let display_name = request.display_name.trim();
        if username.is_empty() || display_name.is_empty() {
            return Err(ChatError::InvalidRequest(
                "username and display name are required".into(),
            ));
        }
        if self.records.user(&user_id).await?.is_some() {
            return Err(ChatError::InvalidRequest(format!(
                "account {user_id} already exists"
            )));
        }
        if self.field_in_use("username", username).await? {
            return Err(ChatError::NameTaken {
                field: "username",
                value: username.to_string(),
            });
        }
        if self.field_in_use("displayName", display_name).await? {
            return Err(ChatError::NameTaken {
                field: "displayName",
                value: display_name.to_string(),
            });
        }

        let mut user = User::new(user_id, username, display_name, request.language);
        user.device_id = request.device_id;
        self.records
            .store()
            .set(&user_path(&user.id), to_fields(&user)?)
            .await?;

        info!(user = %user.id, language = %user.language, "Account created");
        Ok(user)
    }

    /// Load a profile, retrying a fixed number of times while it has not
    /// become readable yet.  The last attempt's failure is returned.
    pub async fn load_profile(&self, user_id: &UserId) -> Result<User> {
        let mut last_error = None;

        for attempt in 1..=self.load_attempts {
            match self.records.user(user_id).await {
                Ok(Some(user)) if user.deleted => {
                    return Err(ChatError::AccountDeleted(user_id.clone()))
                }
                Ok(Some(user)) => return Ok(user),
                Ok(None) => {
                    debug!(user = %user_id, attempt, "Profile not readable yet");
                    last_error = Some(ChatError::not_found("user", user_id));
                }
                Err(e) => {
                    warn!(user = %user_id, attempt, error = %e, "Profile load failed");
                    last_error = Some(e);
                }
            }
            if attempt < self.load_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| ChatError::not_found("user", user_id)))
    }

    pub async fn register_push_token(&self, user_id: &UserId, token: &str) -> Result<()> {
        self.records
            .store()
            .update(
                &user_path(user_id),
                vec![
                    FieldUpdate::set("pushToken", token),
                    FieldUpdate::set("lastActiveAt", now_ms().timestamp_millis()),
                ],
            )
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => ChatError::not_found("user", user_id),
                other => other.into(),
            })?;
        debug!(user = %user_id, "Push token registered");
        Ok(())
    }

    /// Mark the account deleted without removing any data.  The user
    /// disappears from other users' lists and can no longer be requested.
    pub async fn deactivate(&self, user_id: &UserId) -> Result<()> {
        self.records.require_user(user_id).await?;
        self.records
            .store()
            .update(&user_path(user_id), vec![FieldUpdate::set("deleted", true)])
            .await?;
        info!(user = %user_id, "Account deactivated");
        Ok(())
    }

    /// Remove the account and everything it owns: every room it is part of
    /// (with messages), its block list, then the profile itself.
    pub async fn delete_account(&self, user_id: &UserId) -> Result<AccountDeletion> {
        let mut summary = AccountDeletion::default();

        for room in self.records.rooms_for(user_id).await? {
            summary.messages += self.records.delete_room_cascade(&room.id).await?;
            summary.rooms += 1;
        }

        let blocks = self.records.store().query(&blocked_query(user_id)).await?;
        for snap in &blocks {
            self.trust
                .unblock(user_id, &UserId(snap.id().to_string()))
                .await?;
            summary.blocks += 1;
        }

        self.records.store().delete(&user_path(user_id)).await?;
        info!(
            user = %user_id,
            rooms = summary.rooms,
            messages = summary.messages,
            "Account deleted"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::engagement::Engagement;
    use crate::rooms::RoomService;
    use crate::test_support::{memory_records, put_accepted_room, put_user};
    use async_trait::async_trait;
    use parlance_store::{Database, DocPath, DocumentStore, Fields, Snapshot, Subscription};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config(attempts: u32) -> ChatConfig {
        ChatConfig {
            profile_load_attempts: attempts,
            profile_retry_delay: Duration::from_millis(1),
            ..ChatConfig::default()
        }
    }

    fn service(records: &Records) -> AccountService {
        AccountService::new(records.clone(), TrustStore::new(records.clone()), &config(3))
    }

    fn request(id: &str, username: &str, display_name: &str) -> SignupRequest {
        SignupRequest {
            user_id: UserId(id.into()),
            username: username.into(),
            display_name: display_name.into(),
            language: Language::Ko,
            device_id: "device-1".into(),
        }
    }

    /// Hides user profiles from the first `lag` reads.
    struct LaggyStore {
        inner: Database,
        lag: u32,
        reads: AtomicU32,
    }

    #[async_trait]
    impl DocumentStore for LaggyStore {
        async fn add(&self, collection: &str, fields: Fields) -> parlance_store::Result<String> {
            self.inner.add(collection, fields).await
        }

        async fn set(&self, path: &DocPath, fields: Fields) -> parlance_store::Result<()> {
            self.inner.set(path, fields).await
        }

        async fn get(&self, path: &DocPath) -> parlance_store::Result<Option<Snapshot>> {
            if path.collection() == USERS && self.reads.fetch_add(1, Ordering::SeqCst) < self.lag {
                return Ok(None);
            }
            self.inner.get(path).await
        }

        async fn update(
            &self,
            path: &DocPath,
            updates: Vec<FieldUpdate>,
        ) -> parlance_store::Result<()> {
            self.inner.update(path, updates).await
        }

        async fn delete(&self, path: &DocPath) -> parlance_store::Result<bool> {
            self.inner.delete(path).await
        }

        async fn query(&self, query: &Query) -> parlance_store::Result<Vec<Snapshot>> {
            self.inner.query(query).await
        }

        async fn subscribe(&self, query: Query) -> parlance_store::Result<Subscription> {
            self.inner.subscribe(query).await
        }
    }

    fn laggy(lag: u32) -> (Records, Arc<LaggyStore>) {
        let store = Arc::new(LaggyStore {
            inner: Database::open_in_memory().unwrap(),
            lag,
            reads: AtomicU32::new(0),
        });
        (Records::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_signup_and_load() {
        let records = memory_records();
        let accounts = service(&records);

        let user = accounts.signup(request("u1", "minji", "Minji")).await.unwrap();
        assert_eq!(user.language, Language::Ko);
        assert_eq!(user.device_id, "device-1");

        let loaded = accounts.load_profile(&user.id).await.unwrap();
        assert_eq!(loaded, user);
    }

    #[tokio::test]
    async fn test_signup_uniqueness() {
        let records = memory_records();
        let accounts = service(&records);
        accounts.signup(request("u1", "minji", "Minji")).await.unwrap();

        let err = accounts.signup(request("u2", "minji", "Other")).await.unwrap_err();
        assert!(matches!(err, ChatError::NameTaken { field: "username", .. }));

        let err = accounts.signup(request("u3", "other", "Minji")).await.unwrap_err();
        assert!(matches!(err, ChatError::NameTaken { field: "displayName", .. }));

        let err = accounts.signup(request("u1", "again", "Again")).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[tokio::test]
    async fn test_signup_rejects_ids_that_are_not_path_segments() {
        let records = memory_records();
        let accounts = service(&records);

        for id in ["a/b", ""] {
            let err = accounts.signup(request(id, "minji", "Minji")).await.unwrap_err();
            assert!(matches!(err, ChatError::InvalidRequest(_)), "{id:?}");
        }
        assert!(records
            .store()
            .query(&Query::collection(USERS))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_load_profile_retries_through_lag() {
        let (records, store) = laggy(2);
        let accounts = service(&records);
        let user = User::new(UserId("u1".into()), "u1", "U1", Language::En);
        store
            .inner
            .set_document(&user_path(&user.id), &to_fields(&user).unwrap())
            .unwrap();

        let user = accounts.load_profile(&UserId("u1".into())).await.unwrap();
        assert_eq!(user.display_name, "U1");
        assert_eq!(store.reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_load_profile_gives_up() {
        let (records, store) = laggy(u32::MAX);
        let accounts = service(&records);

        let err = accounts.load_profile(&UserId("u1".into())).await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound { kind: "user", .. }));
        assert_eq!(store.reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_deleted_accounts_are_refused() {
        let records = memory_records();
        let accounts = service(&records);
        let user = accounts.signup(request("u1", "minji", "Minji")).await.unwrap();

        accounts.deactivate(&user.id).await.unwrap();
        let err = accounts.load_profile(&user.id).await.unwrap_err();
        assert!(matches!(err, ChatError::AccountDeleted(_)));
        assert_eq!(err.category(), ErrorCategory::Permission);
    }

    #[tokio::test]
    async fn test_register_push_token() {
        let records = memory_records();
        let accounts = service(&records);
        let user = put_user(&records, "u1", Language::En).await;

        accounts.register_push_token(&user.id, "ExponentPushToken[x]").await.unwrap();
        let loaded = records.require_user(&user.id).await.unwrap();
        assert_eq!(loaded.push_token.as_deref(), Some("ExponentPushToken[x]"));

        let err = accounts
            .register_push_token(&UserId("ghost".into()), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_account_cascades() {
        let records = memory_records();
        let trust = TrustStore::new(records.clone());
        let accounts = service(&records);
        let rooms = RoomService::new(records.clone(), trust.clone(), Engagement::new(records.clone()));
        let a = put_user(&records, "a", Language::En).await;
        let b = put_user(&records, "b", Language::Ja).await;
        let c = put_user(&records, "c", Language::Ko).await;
        let d = put_user(&records, "d", Language::Zh).await;

        let accepted = put_accepted_room(&records, &a, &b).await;
        let pending = rooms.request_room(&c.id, &a.id).await.unwrap();
        let untouched = put_accepted_room(&records, &b, &c).await;
        trust.block(&a.id, &d.id, "D").await.unwrap();

        let mut fields = Fields::new();
        fields.insert("senderId".into(), "a".into());
        fields.insert("senderName".into(), "A".into());
        fields.insert("text".into(), "hi".into());
        fields.insert("createdAt".into(), 0.into());
        records
            .store()
            .add(&parlance_shared::constants::messages_collection(accepted.as_str()), fields)
            .await
            .unwrap();

        let summary = accounts.delete_account(&a.id).await.unwrap();
        assert_eq!(
            summary,
            AccountDeletion {
                rooms: 2,
                messages: 1,
                blocks: 1
            }
        );
        assert!(records.user(&a.id).await.unwrap().is_none());
        assert!(records.room(&accepted).await.unwrap().is_none());
        assert!(records.room(pending.room_id()).await.unwrap().is_none());
        assert!(records.room(&untouched).await.unwrap().is_some());
        assert!(trust.list_blocked(&a.id).await.unwrap().is_empty());
    }
}
