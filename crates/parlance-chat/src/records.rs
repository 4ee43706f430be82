//! Typed access to the documents the chat core owns.

use std::sync::Arc;

use tracing::{debug, warn};

use parlance_shared::constants::{
    blocked_collection, group_messages_collection, messages_collection, CHAT_ROOMS, GROUP_CHATS,
    USERS,
};
use parlance_shared::{GroupId, RoomId, UserId};
use parlance_store::{Direction, DocPath, DocumentStore, Filter, Query, Snapshot};

use crate::error::{ChatError, Result};
use crate::models::{decode, ChatRoom, GroupChat, GroupMessage, Message, Record, User};

pub fn user_path(user: &UserId) -> DocPath {
    DocPath::new(USERS, user.as_str())
}

pub fn room_path(room: &RoomId) -> DocPath {
    DocPath::new(CHAT_ROOMS, room.as_str())
}

/// Block-list entry of `blocker` for `blocked`.
pub fn block_path(blocker: &UserId, blocked: &UserId) -> DocPath {
    DocPath::new(blocked_collection(blocker.as_str()), blocked.as_str())
}

/// Every room `user` participates in.
pub fn rooms_for_query(user: &UserId) -> Query {
    Query::collection(CHAT_ROOMS).filter(Filter::array_contains("participants", user.as_str()))
}

/// A room's messages, oldest first.
pub fn messages_query(room: &RoomId) -> Query {
    Query::collection(messages_collection(room.as_str())).order_by("createdAt", Direction::Ascending)
}

pub fn group_path(group: &GroupId) -> DocPath {
    DocPath::new(GROUP_CHATS, group.as_str())
}

/// Every group, most recently active first.
pub fn groups_query() -> Query {
    Query::collection(GROUP_CHATS).order_by("lastMessageAt", Direction::Descending)
}

/// A group's messages, oldest first.
pub fn group_messages_query(group: &GroupId) -> Query {
    Query::collection(group_messages_collection(group.as_str()))
        .order_by("createdAt", Direction::Ascending)
}

/// Decode a result set, logging and skipping documents that do not fit.
pub fn decode_all<T: Record>(snapshots: &[Snapshot]) -> Vec<T> {
    snapshots
        .iter()
        .filter_map(|snap| match decode::<T>(snap) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %snap.path, error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct Records {
    store: Arc<dyn DocumentStore>,
}

impl Records {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn user(&self, id: &UserId) -> Result<Option<User>> {
        match self.store.get(&user_path(id)).await? {
            Some(snap) => Ok(Some(decode(&snap)?)),
            None => Ok(None),
        }
    }

    pub async fn require_user(&self, id: &UserId) -> Result<User> {
        self.user(id)
            .await?
            .ok_or_else(|| ChatError::not_found("user", id))
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    pub async fn room(&self, id: &RoomId) -> Result<Option<ChatRoom>> {
        match self.store.get(&room_path(id)).await? {
            Some(snap) => Ok(Some(decode(&snap)?)),
            None => Ok(None),
        }
    }

    pub async fn require_room(&self, id: &RoomId) -> Result<ChatRoom> {
        self.room(id)
            .await?
            .ok_or_else(|| ChatError::not_found("room", id))
    }

    pub async fn rooms_for(&self, user: &UserId) -> Result<Vec<ChatRoom>> {
        let snaps = self.store.query(&rooms_for_query(user)).await?;
        Ok(decode_all(&snaps))
    }

    /// Rooms shared by `a` and `b`, oldest first.
    pub async fn rooms_between(&self, a: &UserId, b: &UserId) -> Result<Vec<ChatRoom>> {
        let mut rooms: Vec<ChatRoom> = self
            .rooms_for(a)
            .await?
            .into_iter()
            .filter(|room| room.involves_pair(a, b))
            .collect();
        rooms.sort_by_key(|room| room.created_at);
        Ok(rooms)
    }

    pub async fn messages(&self, room: &RoomId) -> Result<Vec<Message>> {
        let snaps = self.store.query(&messages_query(room)).await?;
        Ok(decode_all(&snaps))
    }

    /// Delete a room and every message in it, messages first, so an
    /// interrupted cascade can simply be run again.  Returns the number of
    /// messages deleted.
    pub async fn delete_room_cascade(&self, room: &RoomId) -> Result<usize> {
        let collection = messages_collection(room.as_str());
        let messages = self.store.query(&Query::collection(collection.as_str())).await?;

        let mut deleted = 0;
        for snap in &messages {
            if self.store.delete(&snap.path).await? {
                deleted += 1;
            }
        }

        self.store.delete(&room_path(room)).await?;

        debug!(room = %room, messages = deleted, "Room deleted");
        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    pub async fn group(&self, id: &GroupId) -> Result<Option<GroupChat>> {
        match self.store.get(&group_path(id)).await? {
            Some(snap) => Ok(Some(decode(&snap)?)),
            None => Ok(None),
        }
    }

    pub async fn require_group(&self, id: &GroupId) -> Result<GroupChat> {
        self.group(id)
            .await?
            .ok_or_else(|| ChatError::not_found("group", id))
    }

    pub async fn groups(&self) -> Result<Vec<GroupChat>> {
        let snaps = self.store.query(&groups_query()).await?;
        Ok(decode_all(&snaps))
    }

    pub async fn group_messages(&self, group: &GroupId) -> Result<Vec<GroupMessage>> {
        let snaps = self.store.query(&group_messages_query(group)).await?;
        Ok(decode_all(&snaps))
    }
}
