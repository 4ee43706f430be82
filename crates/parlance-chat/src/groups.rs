//! Open, topic-based group chats.
//!
//! Groups are public: anyone can read and post, and joining only puts a
//! user on the member list.  Every group message records its sender's
//! language, and subscribers see other people's messages translated from
//! that language into their own.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use parlance_shared::constants::{
    group_messages_collection, GROUP_CHATS, SYSTEM_SENDER, SYSTEM_SENDER_NAME,
};
use parlance_shared::{ContentModerator, GroupId, Language, MessageId, RejectReason, UserId};
use parlance_store::{to_fields, FieldUpdate, Snapshot, Subscription};

use crate::error::{ChatError, Result};
use crate::models::{now_ms, GroupChat, GroupMessage, GroupTopic, User};
use crate::records::{decode_all, group_messages_query, group_path, groups_query, Records};
use crate::stream::{MessageView, StreamEvent};
use crate::translation::{TranslationGateway, TranslationQueue};

fn welcome_text(name: &str, language: Language) -> String {
    match language {
        Language::En => format!("Welcome to {name}! Let's start chatting."),
        Language::Es => format!("¡Bienvenidos a {name}! Empecemos a chatear."),
        Language::Zh => format!("欢迎来到 {name}！让我们开始聊天吧。"),
        Language::Ja => format!("{name}へようこそ！チャットを始めましょう。"),
        Language::Ko => format!("{name}에 오신 것을 환영합니다! 대화를 시작해 보세요."),
    }
}

#[derive(Clone)]
pub struct GroupService {
    records: Records,
    moderator: Arc<ContentModerator>,
    gateway: TranslationGateway,
}

impl GroupService {
    pub fn new(records: Records, gateway: TranslationGateway) -> Self {
        Self {
            records,
            moderator: Arc::new(ContentModerator::new()),
            gateway,
        }
    }

    fn moderate(&self, text: &str) -> Result<()> {
        let verdict = self.moderator.validate(text);
        if verdict.is_valid {
            return Ok(());
        }
        Err(ChatError::ContentRejected(
            verdict.reason.unwrap_or(RejectReason::Empty),
        ))
    }

    async fn active_user(&self, id: &UserId) -> Result<User> {
        let user = self.records.require_user(id).await?;
        if user.deleted {
            return Err(ChatError::AccountDeleted(id.clone()));
        }
        Ok(user)
    }

    /// Create a group with its creator as the only member and post a
    /// welcome message in the creator's language.
    pub async fn create_group(
        &self,
        creator_id: &UserId,
        name: &str,
        topic: GroupTopic,
    ) -> Result<GroupChat> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidRequest("group name is required".into()));
        }
        self.moderate(name)?;
        let creator = self.active_user(creator_id).await?;

        let now = now_ms();
        let mut group = GroupChat {
            id: GroupId::default(),
            name: name.to_string(),
            topic,
            topic_name: topic.name(creator.language).to_string(),
            created_by: creator.id.clone(),
            members: vec![creator.id.clone()],
            member_count: 1,
            last_message: String::new(),
            last_message_at: now,
            created_at: now,
        };
        group.id = GroupId(
            self.records
                .store()
                .add(GROUP_CHATS, to_fields(&group)?)
                .await?,
        );

        let welcome = GroupMessage {
            id: MessageId::default(),
            sender_id: UserId(SYSTEM_SENDER.to_string()),
            sender_name: SYSTEM_SENDER_NAME.to_string(),
            sender_language: creator.language,
            text: welcome_text(name, creator.language),
            created_at: now,
        };
        self.records
            .store()
            .add(&group_messages_collection(group.id.as_str()), to_fields(&welcome)?)
            .await?;

        info!(group = %group.id, creator = %creator.id, %topic, "Group created");
        Ok(group)
    }

    pub async fn get_group(&self, group_id: &GroupId) -> Result<GroupChat> {
        self.records.require_group(group_id).await
    }

    /// Every group, most recently active first.
    pub async fn list_groups(&self) -> Result<Vec<GroupChat>> {
        self.records.groups().await
    }

    /// Follow the group list live.
    pub async fn subscribe_groups(&self) -> Result<GroupListSubscription> {
        let inner = self.records.store().subscribe(groups_query()).await?;
        Ok(GroupListSubscription { inner })
    }

    /// Add `user_id` to the member list.  Joining twice changes nothing.
    pub async fn join_group(&self, group_id: &GroupId, user_id: &UserId) -> Result<GroupChat> {
        self.active_user(user_id).await?;
        let mut group = self.records.require_group(group_id).await?;
        if group.is_member(user_id) {
            return Ok(group);
        }

        group.members.push(user_id.clone());
        group.member_count = group.members.len() as i64;
        let members: Vec<Value> = group
            .members
            .iter()
            .map(|m| Value::from(m.as_str()))
            .collect();

        self.records
            .store()
            .update(
                &group_path(group_id),
                vec![
                    FieldUpdate::set("members", members),
                    FieldUpdate::set("memberCount", group.member_count),
                ],
            )
            .await?;

        debug!(group = %group_id, user = %user_id, members = group.member_count, "Joined group");
        Ok(group)
    }

    /// Moderate and post a message, then bump the group's last activity.
    /// The stored text is trimmed.
    pub async fn send(
        &self,
        group_id: &GroupId,
        sender_id: &UserId,
        body: &str,
    ) -> Result<GroupMessage> {
        self.moderate(body)?;
        let body = body.trim();
        self.records.require_group(group_id).await?;
        let sender = self.active_user(sender_id).await?;

        let now = now_ms();
        let mut message = GroupMessage {
            id: MessageId::default(),
            sender_id: sender.id.clone(),
            sender_name: sender.display_name.clone(),
            sender_language: sender.language,
            text: body.to_string(),
            created_at: now,
        };
        let id = self
            .records
            .store()
            .add(&group_messages_collection(group_id.as_str()), to_fields(&message)?)
            .await?;
        message.id = MessageId(id);

        self.records
            .store()
            .update(
                &group_path(group_id),
                vec![
                    FieldUpdate::set("lastMessage", body),
                    FieldUpdate::set("lastMessageAt", now.timestamp_millis()),
                ],
            )
            .await?;

        info!(group = %group_id, sender = %sender_id, message = %message.id, "Group message sent");
        Ok(message)
    }

    /// Open a live, ordered view of a group's messages for `subscriber`.
    pub async fn subscribe(
        &self,
        group_id: &GroupId,
        subscriber: &UserId,
    ) -> Result<GroupMessageSubscription> {
        self.records.require_group(group_id).await?;
        let profile = self.records.require_user(subscriber).await?;
        let inner = self
            .records
            .store()
            .subscribe(group_messages_query(group_id))
            .await?;
        debug!(group = %group_id, user = %subscriber, "Group subscription opened");

        Ok(GroupMessageSubscription {
            group_id: group_id.clone(),
            subscriber: subscriber.clone(),
            language: profile.language,
            inner,
            translations: TranslationQueue::new(self.gateway.clone()),
            latest: Vec::new(),
        })
    }
}

/// The live group list.
pub struct GroupListSubscription {
    inner: Subscription,
}

impl GroupListSubscription {
    /// The next version of the list; the first call returns the list as it
    /// stood when the subscription opened.
    pub async fn next(&mut self) -> Option<Vec<GroupChat>> {
        self.inner.next().await.map(|docs| decode_all(&docs))
    }

    pub fn unsubscribe(self) {}
}

/// A live group message list for one subscriber.
pub struct GroupMessageSubscription {
    group_id: GroupId,
    subscriber: UserId,
    language: Language,
    inner: Subscription,
    translations: TranslationQueue,
    latest: Vec<GroupMessage>,
}

impl GroupMessageSubscription {
    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    pub async fn next(&mut self) -> Option<StreamEvent<GroupMessage>> {
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

    fn on_snapshot(&mut self, docs: &[Snapshot]) -> Vec<MessageView<GroupMessage>> {
        self.latest = decode_all(docs);

        for message in &self.latest {
            if message.sender_id != self.subscriber {
                self.translations.request(
                    &message.id,
                    &message.text,
                    self.language,
                    Some(message.sender_language),
                );
            }
        }

        self.messages()
    }

    pub fn messages(&self) -> Vec<MessageView<GroupMessage>> {
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
