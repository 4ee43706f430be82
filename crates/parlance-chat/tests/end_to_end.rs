//! A full conversation between three users on one in-memory store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use parlance_chat::accounts::SignupRequest;
use parlance_chat::push::NoopPushNotifier;
use parlance_chat::translation::TranslationError;
use parlance_chat::{
    ChatClient, ChatConfig, ChatError, GroupTopic, RequestOutcome, RoomStatus, StreamEvent,
    TranslationGateway, TranslationProvider, User,
};
use parlance_shared::{Language, UserId};
use parlance_store::{Database, DocumentStore};

/// Knows a handful of phrases and fails on everything else.
struct Phrasebook(HashMap<(&'static str, Language), &'static str>);

#[async_trait]
impl TranslationProvider for Phrasebook {
    fn name(&self) -> &str {
        "phrasebook"
    }

    async fn translate(
        &self,
        text: &str,
        _source: Language,
        target: Language,
    ) -> Result<String, TranslationError> {
        self.0
            .iter()
            .find(|((phrase, lang), _)| *phrase == text && *lang == target)
            .map(|(_, out)| out.to_string())
            .ok_or(TranslationError::Empty)
    }
}

struct Down;

#[async_trait]
impl TranslationProvider for Down {
    fn name(&self) -> &str {
        "down"
    }

    async fn translate(
        &self,
        _text: &str,
        _source: Language,
        _target: Language,
    ) -> Result<String, TranslationError> {
        Err(TranslationError::UnexpectedResponse("503".into()))
    }
}

fn client() -> ChatClient {
    let store: Arc<dyn DocumentStore> = Arc::new(Database::open_in_memory().unwrap());
    let phrasebook = Phrasebook(HashMap::from([(("Hello", Language::Ja), "こんにちは")]));
    ChatClient::with_services(
        store,
        &ChatConfig::default(),
        // The primary is down for the whole conversation.
        TranslationGateway::new(Arc::new(Down), Arc::new(phrasebook)),
        Arc::new(NoopPushNotifier),
    )
}

async fn signup(client: &ChatClient, id: &str, name: &str, language: Language) -> User {
    client
        .accounts
        .signup(SignupRequest {
            user_id: UserId(id.into()),
            username: id.into(),
            display_name: name.into(),
            language,
            device_id: format!("{id}-device"),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_request_accept_message_translate_reject_reset() {
    let client = client();
    let a = signup(&client, "a", "Alice", Language::En).await;
    let b = signup(&client, "b", "Bora", Language::Ja).await;
    let c = signup(&client, "c", "Chen", Language::Zh).await;

    // A asks B.
    let outcome = client.rooms.request_room(&a.id, &b.id).await.unwrap();
    let RequestOutcome::Created(ab) = outcome.clone() else {
        panic!("expected a new room, got {outcome:?}");
    };
    let room = client.rooms.get_room(&ab).await.unwrap();
    assert_eq!(room.status, RoomStatus::Pending);
    assert_eq!(room.requested_by, a.id);

    // B sees an incoming request and accepts it.
    let rows = client.room_list.load(&b.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].incoming_request);
    let room = client.rooms.accept_room(&ab, &b.id).await.unwrap();
    assert_eq!(room.status, RoomStatus::Accepted);

    // A says hello.
    client.messages.send(&ab, &a.id, "Hello").await.unwrap();
    let room = client.rooms.get_room(&ab).await.unwrap();
    assert_eq!(room.unread_for(&b.id), 1);
    assert_eq!(room.unread_for(&a.id), 0);
    assert_eq!(room.last_message, "Hello");

    // B opens the conversation and gets the Japanese translation.
    let mut sub = client.messages.subscribe(&ab, &b.id).await.unwrap();
    let room = client.rooms.get_room(&ab).await.unwrap();
    assert_eq!(room.unread_for(&b.id), 0);

    let mut translated = None;
    while translated.is_none() {
        let event = timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("no event")
            .expect("subscription closed");
        match event {
            StreamEvent::Messages(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].message.text, "Hello");
            }
            StreamEvent::Translated { text, .. } => translated = Some(text),
        }
    }
    assert_eq!(translated.as_deref(), Some("こんにちは"));
    assert_eq!(sub.messages()[0].translation.as_deref(), Some("こんにちは"));
    sub.unsubscribe();

    // C asks B, B declines: hidden for both.
    let first = client.rooms.request_room(&c.id, &b.id).await.unwrap();
    let rejected = client.rooms.reject_room(first.room_id(), &b.id).await.unwrap();
    assert_eq!(rejected.status, RoomStatus::Rejected);
    assert!(client.room_list.load(&c.id).await.unwrap().is_empty());
    let b_rows = client.room_list.load(&b.id).await.unwrap();
    assert_eq!(b_rows.len(), 1);
    assert_eq!(b_rows[0].counterpart.id, a.id);

    // C asks again: the rejected room is replaced by a fresh request.
    let again = client.rooms.request_room(&c.id, &b.id).await.unwrap();
    let RequestOutcome::Reset { previous, room } = again.clone() else {
        panic!("expected a reset, got {again:?}");
    };
    assert_eq!(&previous, first.room_id());
    assert!(client.records().room(&previous).await.unwrap().is_none());
    let fresh = client.rooms.get_room(&room).await.unwrap();
    assert_eq!(fresh.status, RoomStatus::Pending);
    assert!(client.records().messages(&room).await.unwrap().is_empty());

    // B blocks C: the fresh room goes and C cannot ask again.
    client.trust.block(&b.id, &c.id, &c.display_name).await.unwrap();
    assert!(client.records().room(&room).await.unwrap().is_none());
    assert!(matches!(
        client.rooms.request_room(&c.id, &b.id).await,
        Err(ChatError::Blocked)
    ));
}

#[tokio::test]
async fn test_messages_stay_in_send_order() {
    let client = client();
    let a = signup(&client, "a", "Alice", Language::En).await;
    let b = signup(&client, "b", "Bora", Language::Ja).await;

    let ab = client
        .rooms
        .request_room(&a.id, &b.id)
        .await
        .unwrap()
        .room_id()
        .clone();
    client.rooms.accept_room(&ab, &b.id).await.unwrap();

    let texts: Vec<String> = (0..20).map(|i| format!("message {i}")).collect();
    for (i, text) in texts.iter().enumerate() {
        let sender = if i % 2 == 0 { &a.id } else { &b.id };
        client.messages.send(&ab, sender, text).await.unwrap();
    }

    let stored: Vec<String> = client
        .records()
        .messages(&ab)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(stored, texts);

    let room = client.rooms.get_room(&ab).await.unwrap();
    assert_eq!(room.unread_for(&a.id), 10);
    assert_eq!(room.unread_for(&b.id), 10);
    assert_eq!(room.last_message, "message 19");
}

#[tokio::test]
async fn test_group_chat_across_languages() {
    let client = client();
    let alice = signup(&client, "alice", "Alice", Language::En).await;
    let kenji = signup(&client, "kenji", "Kenji", Language::Ja).await;

    let group = client
        .groups
        .create_group(&alice.id, "Film club", GroupTopic::Movies)
        .await
        .unwrap();
    assert_eq!(group.topic_name, "Movies & TV");
    client.groups.join_group(&group.id, &kenji.id).await.unwrap();

    let mut sub = client.groups.subscribe(&group.id, &kenji.id).await.unwrap();
    let hello = client.groups.send(&group.id, &alice.id, "Hello").await.unwrap();

    while sub.translation(&hello.id).is_none() {
        timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("timed out")
            .expect("closed");
    }
    assert_eq!(sub.translation(&hello.id), Some("こんにちは"));

    let views = sub.messages();
    assert_eq!(views[0].message.text, "Welcome to Film club! Let's start chatting.");
    assert_eq!(views.last().map(|v| v.message.id.clone()), Some(hello.id));

    let groups = client.groups.list_groups().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].member_count, 2);
    assert_eq!(groups[0].last_message, "Hello");
}
