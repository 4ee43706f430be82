//! Sending, observing and acknowledging messages in a room.
//!
//! A [`MessageSubscription`] owns its translation cache.  Messages from the
//! other participant are translated in the background into the subscriber's
//! language; each translation is produced once per session and reported as
//! a [`StreamEvent::Translated`] event when it lands.  Dropping the
//! subscription aborts any translation still in flight.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use parlance_shared::constants::messages_collection;
use parlance_shared::{ContentModerator, Language, MessageId, RejectReason, RoomId, UserId};
use parlance_store::{to_fields, FieldPath, FieldUpdate, Snapshot, Subscription};

use crate::engagement::Engagement;
use crate::error::{ChatError, Result};
use crate::models::{now_ms, ChatRoom, Message, RoomStatus, User};
use crate::push::{dispatch, PushNotification, PushNotifier};
use crate::records::{decode_all, messages_query, room_path, Records};
use crate::translation::{TranslationGateway, TranslationQueue};
use crate::trust::TrustStore;

/// A message as shown to one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageView<M = Message> {
    pub message: M,
    /// Translation into the subscriber's language, once available.  Always
    /// `None` for the subscriber's own messages.
    pub translation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<M = Message> {
    /// The full, ordered message list.
    Messages(Vec<MessageView<M>>),
    /// A translation finished for one message.
    Translated { message_id: MessageId, text: String },
}

fn unread_field(user: &UserId) -> FieldPath {
    FieldPath::new(["unread", user.as_str()])
}

#[derive(Clone)]
pub struct MessageStream {
    records: Records,
    trust: TrustStore,
    moderator: Arc<ContentModerator>,
    gateway: TranslationGateway,
    notifier: Arc<dyn PushNotifier>,
    engagement: Engagement,
}

impl MessageStream {
    pub fn new(
        records: Records,
        trust: TrustStore,
        gateway: TranslationGateway,
        notifier: Arc<dyn PushNotifier>,
        engagement: Engagement,
    ) -> Self {
        Self {
            records,
            trust,
            moderator: Arc::new(ContentModerator::new()),
            gateway,
            notifier,
            engagement,
        }
    }

    /// Load a room and make sure `user` may take part in it.
    async fn open_room(&self, room_id: &RoomId, user: &UserId) -> Result<(ChatRoom, UserId)> {
        let room = self.records.require_room(room_id).await?;
        let Some(other) = room.counterpart(user).cloned() else {
            return Err(ChatError::NotParticipant {
                user: user.clone(),
                room: room_id.clone(),
            });
        };
        if self.trust.is_blocked_either_direction(user, &other).await? {
            return Err(ChatError::Blocked);
        }
        Ok((room, other))
    }

    /// Moderate, persist and announce a message.  Surrounding whitespace is
    /// trimmed before the text is stored.
    pub async fn send(&self, room_id: &RoomId, sender_id: &UserId, body: &str) -> Result<Message> {
        let verdict = self.moderator.validate(body);
        if !verdict.is_valid {
            let reason = verdict.reason.unwrap_or(RejectReason::Empty);
            debug!(room = %room_id, sender = %sender_id, %reason, "Message rejected");
            return Err(ChatError::ContentRejected(reason));
        }
        let body = body.trim();

        let (room, recipient_id) = self.open_room(room_id, sender_id).await?;
        if room.status != RoomStatus::Accepted {
            return Err(ChatError::InvalidTransition {
                room: room_id.clone(),
                status: room.status,
                action: "send messages",
            });
        }
        let sender = self.records.require_user(sender_id).await?;

        let now = now_ms();
        let mut message = Message {
            id: MessageId::default(),
            sender_id: sender_id.clone(),
            sender_name: sender.display_name.clone(),
            text: body.to_string(),
            created_at: now,
        };
        let id = self
            .records
            .store()
            .add(&messages_collection(room_id.as_str()), to_fields(&message)?)
            .await?;
        message.id = MessageId(id);

        self.records
            .store()
            .update(
                &room_path(room_id),
                vec![
                    FieldUpdate::set("lastMessage", body),
                    FieldUpdate::set("lastMessageAt", now.timestamp_millis()),
                    FieldUpdate::increment(unread_field(&recipient_id), 1),
                ],
            )
            .await?;

        info!(room = %room_id, sender = %sender_id, message = %message.id, "Message sent");

        self.engagement.record_message_sent(sender_id).await;
        self.notify_recipient(&sender, &recipient_id, room_id, &message)
            .await;
        Ok(message)
    }

    async fn notify_recipient(
        &self,
        sender: &User,
        recipient_id: &UserId,
        room_id: &RoomId,
        message: &Message,
    ) {
        let recipient = match self.records.user(recipient_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                warn!(recipient = %recipient_id, error = %e, "Could not load push recipient");
                return;
            }
        };
        let Some(token) = recipient.push_token else {
            return;
        };
        // Two accounts on one device share a token; never notify yourself.
        if sender.push_token.as_deref() == Some(token.as_str()) {
            return;
        }

        dispatch(
            self.notifier.clone(),
            PushNotification {
                to: token,
                title: sender.display_name.clone(),
                body: message.text.clone(),
                data: json!({
                    "chatRoomId": room_id.as_str(),
                    "otherUserId": sender.id.as_str(),
                    "otherUserName": sender.display_name.as_str(),
                }),
            },
        );
    }

    /// Open a live, ordered view of a room's messages for `subscriber`.
    ///
    /// Attaching counts as reading: the subscriber's unread counter is reset.
    pub async fn subscribe(
        &self,
        room_id: &RoomId,
        subscriber: &UserId,
    ) -> Result<MessageSubscription> {
        self.open_room(room_id, subscriber).await?;
        let profile = self.records.require_user(subscriber).await?;
        self.reset_unread(room_id, subscriber).await?;

        let inner = self.records.store().subscribe(messages_query(room_id)).await?;
        debug!(room = %room_id, user = %subscriber, "Message subscription opened");

        Ok(MessageSubscription {
            room_id: room_id.clone(),
            subscriber: subscriber.clone(),
            language: profile.language,
            inner,
            translations: TranslationQueue::new(self.gateway.clone()),
            latest: Vec::new(),
        })
    }

    /// Set `user`'s unread counter for the room to zero.
    pub async fn reset_unread(&self, room_id: &RoomId, user: &UserId) -> Result<()> {
        let room = self.records.require_room(room_id).await?;
        if !room.is_participant(user) {
            return Err(ChatError::NotParticipant {
                user: user.clone(),
                room: room_id.clone(),
            });
        }
        self.records
            .store()
            .update(&room_path(room_id), vec![FieldUpdate::set(unread_field(user), 0)])
            .await?;
        Ok(())
    }
}

/// A live message list for one subscriber.  Drop it or call
/// [`unsubscribe`](Self::unsubscribe) to tear it down.
pub struct MessageSubscription {
    room_id: RoomId,
    subscriber: UserId,
    language: Language,
    inner: Subscription,
    translations: TranslationQueue,
    latest: Vec<Message>,
}

impl MessageSubscription {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Wait for the next change: a new message list or a finished
    /// translation.  Returns `None` once the store goes away.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        tokio::select! {
            snapshot = self.inner.next() => {
                let docs = snapshot?;
                Some(StreamEvent::Messages(self.on_snapshot(&docs)))
            }
            Some((message_id, text)) = self.translations.finished(), if self.translations.has_pending() => {
                Some(StreamEvent::Translated { message_id, text })
            }
        }
    }

    fn on_snapshot(&mut self, docs: &[Snapshot]) -> Vec<MessageView> {
        self.latest = decode_all(docs);

        for message in &self.latest {
            if message.sender_id != self.subscriber {
                self.translations
                    .request(&message.id, &message.text, self.language, None);
            }
        }

        self.messages()
    }

    /// The current message list with whatever translations are ready.
    pub fn messages(&self) -> Vec<MessageView> {
        self.latest
            .iter()
            .map(|message| MessageView {
                message: message.clone(),
                translation: self.translation(&message.id).map(str::to_string),
            })
            .collect()
    }

    pub fn translation(&self, id: &MessageId) -> Option<&str> {
        self.translations.get(id)
    }

    pub fn unsubscribe(self) {}
}
