//! The chat-room lifecycle: `pending -> accepted | rejected`.
//!
//! A rejected room is terminal for that room, not for the pair: the next
//! request between the two deletes it and starts over.  Existing-room lookup
//! before creation is a plain query, not a transaction, so two simultaneous
//! requests can still create two rooms.  Whenever several rooms exist for a
//! pair the oldest live one is acted on, and every rejected one is deleted
//! by the next request.

use tracing::{debug, info};

use parlance_shared::constants::CHAT_ROOMS;
use parlance_shared::{RoomId, UserId};
use parlance_store::{to_fields, FieldUpdate};

use crate::engagement::Engagement;
use crate::error::{ChatError, Result};
use crate::models::{now_ms, ChatRoom, RoomStatus, User};
use crate::records::{room_path, Records};
use crate::trust::TrustStore;

/// What a room request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new pending room was created.
    Created(RoomId),
    /// The requester already has a pending request out to this user.
    AlreadyRequested(RoomId),
    /// The other user has already asked; answer that request instead.
    IncomingRequest(RoomId),
    /// The two already have an accepted room.
    Active(RoomId),
    /// A rejected room was deleted and a fresh pending one created.
    Reset { previous: RoomId, room: RoomId },
}

impl RequestOutcome {
    pub fn room_id(&self) -> &RoomId {
        match self {
            RequestOutcome::Created(id)
            | RequestOutcome::AlreadyRequested(id)
            | RequestOutcome::IncomingRequest(id)
            | RequestOutcome::Active(id)
            | RequestOutcome::Reset { room: id, .. } => id,
        }
    }

    pub fn created_room(&self) -> bool {
        matches!(self, RequestOutcome::Created(_) | RequestOutcome::Reset { .. })
    }
}

#[derive(Clone)]
pub struct RoomService {
    records: Records,
    trust: TrustStore,
    engagement: Engagement,
}

impl RoomService {
    pub fn new(records: Records, trust: TrustStore, engagement: Engagement) -> Self {
        Self {
            records,
            trust,
            engagement,
        }
    }

    pub async fn request_room(
        &self,
        requester_id: &UserId,
        recipient_id: &UserId,
    ) -> Result<RequestOutcome> {
        if requester_id == recipient_id {
            return Err(ChatError::InvalidRequest(
                "cannot request a chat with yourself".into(),
            ));
        }

        let recipient = self.records.require_user(recipient_id).await?;
        if recipient.deleted {
            return Err(ChatError::UserDeleted(recipient_id.clone()));
        }
        let requester = self.records.require_user(requester_id).await?;
        if requester.deleted {
            return Err(ChatError::AccountDeleted(requester_id.clone()));
        }
        if self
            .trust
            .is_blocked_either_direction(requester_id, recipient_id)
            .await?
        {
            return Err(ChatError::Blocked);
        }

        let (rejected, live): (Vec<ChatRoom>, Vec<ChatRoom>) = self
            .records
            .rooms_between(requester_id, recipient_id)
            .await?
            .into_iter()
            .partition(|room| room.status == RoomStatus::Rejected);

        // Rejected rooms never survive a new request, whether or not a
        // duplicate live room exists alongside them.
        for room in &rejected {
            self.records.delete_room_cascade(&room.id).await?;
        }

        let outcome = match (live.into_iter().next(), rejected.into_iter().next()) {
            (Some(room), _) => match room.status {
                RoomStatus::Pending if room.requested_by == *requester_id => {
                    RequestOutcome::AlreadyRequested(room.id)
                }
                RoomStatus::Pending => RequestOutcome::IncomingRequest(room.id),
                _ => RequestOutcome::Active(room.id),
            },
            (None, Some(previous)) => RequestOutcome::Reset {
                previous: previous.id,
                room: self.create_room(&requester, &recipient).await?,
            },
            (None, None) => {
                RequestOutcome::Created(self.create_room(&requester, &recipient).await?)
            }
        };

        debug!(
            requester = %requester_id,
            recipient = %recipient_id,
            outcome = ?outcome,
            "Room requested"
        );
        Ok(outcome)
    }

    async fn create_room(&self, requester: &User, recipient: &User) -> Result<RoomId> {
        let room = ChatRoom::request(requester, recipient, now_ms());
        let id = RoomId(
            self.records
                .store()
                .add(CHAT_ROOMS, to_fields(&room)?)
                .await?,
        );
        info!(room = %id, requester = %requester.id, recipient = %recipient.id, "Room created");

        self.engagement.record_chat_started(&requester.id).await;
        Ok(id)
    }

    pub async fn accept_room(&self, room_id: &RoomId, acting: &UserId) -> Result<ChatRoom> {
        self.respond(room_id, acting, RoomStatus::Accepted).await
    }

    /// Reject a pending request.  The room stays in the store, hidden from
    /// both lists, until the pair's next request resets it.
    pub async fn reject_room(&self, room_id: &RoomId, acting: &UserId) -> Result<ChatRoom> {
        self.respond(room_id, acting, RoomStatus::Rejected).await
    }

    async fn respond(
        &self,
        room_id: &RoomId,
        acting: &UserId,
        to: RoomStatus,
    ) -> Result<ChatRoom> {
        let action = match to {
            RoomStatus::Accepted => "accept",
            _ => "reject",
        };

        let mut room = self.records.require_room(room_id).await?;
        if !room.is_participant(acting) {
            return Err(ChatError::NotParticipant {
                user: acting.clone(),
                room: room_id.clone(),
            });
        }
        if room.status != RoomStatus::Pending {
            return Err(ChatError::InvalidTransition {
                room: room_id.clone(),
                status: room.status,
                action,
            });
        }
        if room.requested_by == *acting {
            return Err(ChatError::RequesterCannotRespond(room_id.clone()));
        }

        let now = now_ms();
        let stamp = match to {
            RoomStatus::Accepted => {
                room.accepted_at = Some(now);
                "acceptedAt"
            }
            _ => {
                room.rejected_at = Some(now);
                "rejectedAt"
            }
        };
        room.status = to;

        self.records
            .store()
            .update(
                &room_path(room_id),
                vec![
                    FieldUpdate::set("status", to.as_str()),
                    FieldUpdate::set(stamp, now.timestamp_millis()),
                ],
            )
            .await?;

        info!(room = %room_id, user = %acting, status = %to, "Room request answered");
        Ok(room)
    }

    /// Delete a room and its messages.  Returns the number of messages
    /// removed.
    pub async fn delete_room_cascade(&self, room_id: &RoomId) -> Result<usize> {
        self.records.delete_room_cascade(room_id).await
    }

    pub async fn get_room(&self, room_id: &RoomId) -> Result<ChatRoom> {
        self.records.require_room(room_id).await
    }

    /// The oldest room shared by `a` and `b`, if any.
    pub async fn find_room_between(&self, a: &UserId, b: &UserId) -> Result<Option<ChatRoom>> {
        Ok(self.records.rooms_between(a, b).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use chrono::Utc;
    use crate::test_support::{memory_records, put_user, save_user};
    use parlance_shared::constants::messages_collection;
    use parlance_shared::Language;

    struct Fixture {
        records: Records,
        trust: TrustStore,
        rooms: RoomService,
    }

    fn fixture() -> Fixture {
        let records = memory_records();
        let trust = TrustStore::new(records.clone());
        let rooms = RoomService::new(
            records.clone(),
            trust.clone(),
            Engagement::new(records.clone()),
        );
        Fixture {
            records,
            trust,
            rooms,
        }
    }

    async fn add_message(records: &Records, room: &RoomId, text: &str) {
        let mut fields = parlance_store::Fields::new();
        fields.insert("senderId".into(), "a".into());
        fields.insert("senderName".into(), "A".into());
        fields.insert("text".into(), text.into());
        fields.insert("createdAt".into(), Utc::now().timestamp_millis().into());
        records
            .store()
            .add(&messages_collection(room.as_str()), fields)
            .await
            .unwrap();
    }

    async fn pair_rooms(records: &Records, a: &UserId, b: &UserId) -> usize {
        records.rooms_between(a, b).await.unwrap().len()
    }

    #[tokio::test]
    async fn test_request_creates_pending_room() {
        let f = fixture();
        let a = put_user(&f.records, "a", Language::En).await;
        let b = put_user(&f.records, "b", Language::Ja).await;

        let outcome = f.rooms.request_room(&a.id, &b.id).await.unwrap();
        assert!(matches!(outcome, RequestOutcome::Created(_)));
        assert!(outcome.created_room());

        let room = f.rooms.get_room(outcome.room_id()).await.unwrap();
        assert_eq!(room.status, RoomStatus::Pending);
        assert_eq!(room.requested_by, a.id);
        assert_eq!(room.unread_for(&a.id), 0);
        assert_eq!(room.unread_for(&b.id), 0);
        assert!(room.requested_at.is_some());

        let profile = f.records.require_user(&a.id).await.unwrap();
        assert_eq!(profile.total_chats, 1);
    }

    #[tokio::test]
    async fn test_repeat_requests_are_idempotent() {
        let f = fixture();
        let a = put_user(&f.records, "a", Language::En).await;
        let b = put_user(&f.records, "b", Language::Ja).await;

        let first = f.rooms.request_room(&a.id, &b.id).await.unwrap();
        let again = f.rooms.request_room(&a.id, &b.id).await.unwrap();
        assert_eq!(again, RequestOutcome::AlreadyRequested(first.room_id().clone()));

        let reverse = f.rooms.request_room(&b.id, &a.id).await.unwrap();
        assert_eq!(reverse, RequestOutcome::IncomingRequest(first.room_id().clone()));

        f.rooms.accept_room(first.room_id(), &b.id).await.unwrap();
        let active = f.rooms.request_room(&b.id, &a.id).await.unwrap();
        assert_eq!(active, RequestOutcome::Active(first.room_id().clone()));
        assert_eq!(pair_rooms(&f.records, &a.id, &b.id).await, 1);
    }

    #[tokio::test]
    async fn test_request_preconditions() {
        let f = fixture();
        let a = put_user(&f.records, "a", Language::En).await;
        let mut gone = put_user(&f.records, "gone", Language::Ja).await;
        gone.deleted = true;
        save_user(&f.records, &gone).await;

        let err = f.rooms.request_room(&a.id, &a.id).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);

        let err = f.rooms.request_room(&a.id, &gone.id).await.unwrap_err();
        assert!(matches!(err, ChatError::UserDeleted(_)));

        let err = f
            .rooms
            .request_room(&a.id, &UserId("nobody".into()))
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn test_accept_and_reject_rules() {
        let f = fixture();
        let a = put_user(&f.records, "a", Language::En).await;
        let b = put_user(&f.records, "b", Language::Ja).await;
        let c = put_user(&f.records, "c", Language::Ko).await;
        let room = f.rooms.request_room(&a.id, &b.id).await.unwrap();
        let id = room.room_id();

        let err = f.rooms.accept_room(id, &a.id).await.unwrap_err();
        assert!(matches!(err, ChatError::RequesterCannotRespond(_)));

        let err = f.rooms.accept_room(id, &c.id).await.unwrap_err();
        assert!(matches!(err, ChatError::NotParticipant { .. }));
        assert_eq!(err.category(), ErrorCategory::Permission);

        let accepted = f.rooms.accept_room(id, &b.id).await.unwrap();
        assert_eq!(accepted.status, RoomStatus::Accepted);
        assert!(accepted.accepted_at.is_some());
        assert_eq!(f.rooms.get_room(id).await.unwrap(), accepted);

        let err = f.rooms.reject_room(id, &b.id).await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::InvalidTransition {
                status: RoomStatus::Accepted,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_rejected_room_is_reset_by_next_request() {
        let f = fixture();
        let b = put_user(&f.records, "b", Language::Ja).await;
        let c = put_user(&f.records, "c", Language::Ko).await;

        let first = f.rooms.request_room(&c.id, &b.id).await.unwrap();
        add_message(&f.records, first.room_id(), "hello?").await;
        let rejected = f.rooms.reject_room(first.room_id(), &b.id).await.unwrap();
        assert_eq!(rejected.status, RoomStatus::Rejected);
        assert!(rejected.rejected_at.is_some());

        let again = f.rooms.request_room(&c.id, &b.id).await.unwrap();
        let RequestOutcome::Reset { previous, room } = &again else {
            panic!("expected reset, got {again:?}");
        };
        assert_eq!(previous, first.room_id());
        assert_ne!(room, first.room_id());
        assert!(f.records.room(previous).await.unwrap().is_none());
        assert!(f.records.messages(previous).await.unwrap().is_empty());

        let fresh = f.rooms.get_room(room).await.unwrap();
        assert_eq!(fresh.status, RoomStatus::Pending);
        assert_eq!(fresh.requested_by, c.id);
    }

    #[tokio::test]
    async fn test_reset_cycles_keep_one_fresh_room() {
        let f = fixture();
        let a = put_user(&f.records, "a", Language::En).await;
        let b = put_user(&f.records, "b", Language::Ja).await;

        let mut current = f.rooms.request_room(&a.id, &b.id).await.unwrap();
        for cycle in 0..4 {
            add_message(&f.records, current.room_id(), &format!("m{cycle}")).await;
            f.rooms.reject_room(current.room_id(), &b.id).await.unwrap();
            current = f.rooms.request_room(&a.id, &b.id).await.unwrap();
            assert!(matches!(current, RequestOutcome::Reset { .. }));

            let room = f.rooms.get_room(current.room_id()).await.unwrap();
            assert_eq!(room.status, RoomStatus::Pending);
            assert!(f.records.messages(current.room_id()).await.unwrap().is_empty());
            assert_eq!(pair_rooms(&f.records, &a.id, &b.id).await, 1);
        }
    }

    #[tokio::test]
    async fn test_block_stops_requests_both_ways() {
        let f = fixture();
        let a = put_user(&f.records, "a", Language::En).await;
        let b = put_user(&f.records, "b", Language::Ja).await;
        let room = f.rooms.request_room(&a.id, &b.id).await.unwrap();

        f.trust.block(&a.id, &b.id, "B").await.unwrap();
        assert!(f.records.room(room.room_id()).await.unwrap().is_none());

        for (x, y) in [(&a.id, &b.id), (&b.id, &a.id)] {
            let err = f.rooms.request_room(x, y).await.unwrap_err();
            assert!(matches!(err, ChatError::Blocked));
        }
        assert_eq!(pair_rooms(&f.records, &a.id, &b.id).await, 0);
    }

    #[tokio::test]
    async fn test_oldest_duplicate_is_authoritative() {
        let f = fixture();
        let a = put_user(&f.records, "a", Language::En).await;
        let b = put_user(&f.records, "b", Language::Ja).await;

        // Two requests that raced past each other's lookup.
        let older = ChatRoom::request(&a, &b, Utc::now() - chrono::Duration::seconds(5));
        let newer = ChatRoom::request(&b, &a, Utc::now());
        let older_id = f
            .records
            .store()
            .add(CHAT_ROOMS, to_fields(&older).unwrap())
            .await
            .unwrap();
        f.records
            .store()
            .add(CHAT_ROOMS, to_fields(&newer).unwrap())
            .await
            .unwrap();

        let found = f.rooms.find_room_between(&b.id, &a.id).await.unwrap().unwrap();
        assert_eq!(found.id.as_str(), older_id);
        assert_eq!(
            f.rooms.request_room(&a.id, &b.id).await.unwrap(),
            RequestOutcome::AlreadyRequested(RoomId(older_id))
        );
    }

    #[tokio::test]
    async fn test_reset_removes_rejected_duplicates() {
        let f = fixture();
        let a = put_user(&f.records, "a", Language::En).await;
        let b = put_user(&f.records, "b", Language::Ja).await;

        let mut older = ChatRoom::request(&a, &b, Utc::now() - chrono::Duration::seconds(5));
        older.status = RoomStatus::Rejected;
        older.rejected_at = Some(Utc::now());
        let newer = ChatRoom::request(&b, &a, Utc::now());
        let older_id = RoomId(
            f.records
                .store()
                .add(CHAT_ROOMS, to_fields(&older).unwrap())
                .await
                .unwrap(),
        );
        let newer_id = RoomId(
            f.records
                .store()
                .add(CHAT_ROOMS, to_fields(&newer).unwrap())
                .await
                .unwrap(),
        );
        add_message(&f.records, &older_id, "stale").await;

        let outcome = f.rooms.request_room(&a.id, &b.id).await.unwrap();
        assert_eq!(outcome, RequestOutcome::IncomingRequest(newer_id.clone()));
        assert_eq!(pair_rooms(&f.records, &a.id, &b.id).await, 1);
        assert!(f.records.room(&older_id).await.unwrap().is_none());
        assert!(f.records.messages(&older_id).await.unwrap().is_empty());

        // Only rejected rooms left: every one goes and a single fresh room
        // replaces them.
        f.rooms.reject_room(&newer_id, &a.id).await.unwrap();
        let mut extra = ChatRoom::request(&a, &b, Utc::now());
        extra.status = RoomStatus::Rejected;
        f.records
            .store()
            .add(CHAT_ROOMS, to_fields(&extra).unwrap())
            .await
            .unwrap();

        let outcome = f.rooms.request_room(&a.id, &b.id).await.unwrap();
        let RequestOutcome::Reset { previous, room } = &outcome else {
            panic!("expected reset, got {outcome:?}");
        };
        assert_eq!(previous, &newer_id);
        let rooms = f.records.rooms_between(&a.id, &b.id).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(&rooms[0].id, room);
        assert_eq!(rooms[0].status, RoomStatus::Pending);
    }
}
