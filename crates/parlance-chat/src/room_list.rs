//! The per-user list of chat rooms shown on the chats screen.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use parlance_shared::constants::USERS;
use parlance_shared::UserId;
use parlance_store::{Filter, Query, Snapshot, Subscription};

use crate::error::Result;
use crate::models::{ChatRoom, RoomStatus, User};
use crate::records::{decode_all, rooms_for_query, Records};
use crate::trust::{blocked_query, TrustStore};

/// Profiles marked deleted.
fn deactivated_query() -> Query {
    Query::collection(USERS).filter(Filter::eq("deleted", true))
}

fn snapshot_ids(docs: &[Snapshot]) -> BTreeSet<String> {
    docs.iter().map(|snap| snap.id().to_string()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomListRow {
    pub room: ChatRoom,
    /// The other participant's current profile.
    pub counterpart: User,
    pub unread_count: i64,
    /// A pending request the viewer has not answered yet.
    pub incoming_request: bool,
}

#[derive(Clone)]
pub struct RoomListProjection {
    records: Records,
    trust: TrustStore,
}

impl RoomListProjection {
    pub fn new(records: Records, trust: TrustStore) -> Self {
        Self { records, trust }
    }

    pub async fn load(&self, viewer: &UserId) -> Result<Vec<RoomListRow>> {
        let rooms = self.records.rooms_for(viewer).await?;
        self.project(viewer, rooms).await
    }

    /// Build the visible rows, most recent activity first.
    ///
    /// Rejected rooms are hidden, as are rooms whose other participant is
    /// blocked in either direction, missing or deleted.
    async fn project(&self, viewer: &UserId, rooms: Vec<ChatRoom>) -> Result<Vec<RoomListRow>> {
        let blocked = self.trust.list_blocked(viewer).await?;
        let mut rows = Vec::with_capacity(rooms.len());

        for room in rooms {
            if room.status == RoomStatus::Rejected {
                continue;
            }
            let Some(other) = room.counterpart(viewer).cloned() else {
                continue;
            };
            if blocked.contains(&other) || self.trust.is_blocked(&other, viewer).await? {
                continue;
            }

            let counterpart = match self.records.user(&other).await {
                Ok(Some(user)) if !user.deleted => user,
                Ok(_) => continue,
                Err(e) => {
                    warn!(room = %room.id, user = %other, error = %e, "Skipping room with unreadable participant");
                    continue;
                }
            };

            rows.push(RoomListRow {
                unread_count: room.unread_for(viewer),
                incoming_request: room.status == RoomStatus::Pending
                    && room.requested_by != *viewer,
                counterpart,
                room,
            });
        }

        rows.sort_by(|a, b| b.room.last_message_at.cmp(&a.room.last_message_at));
        Ok(rows)
    }

    /// Follow the list live.  Rows are recomputed whenever one of the
    /// viewer's rooms changes, the viewer's block list changes, or an
    /// account is deactivated or restored.
    pub async fn subscribe(&self, viewer: &UserId) -> Result<RoomListSubscription> {
        let store = self.records.store();
        let mut rooms_sub = store.subscribe(rooms_for_query(viewer)).await?;
        let mut blocks_sub = store.subscribe(blocked_query(viewer)).await?;
        let mut users_sub = store.subscribe(deactivated_query()).await?;

        // Every query delivers its current result set on registration.
        let rooms = rooms_sub
            .next()
            .await
            .map(|docs| decode_all(&docs))
            .unwrap_or_default();
        blocks_sub.next().await;
        let deactivated = users_sub
            .next()
            .await
            .map(|docs| snapshot_ids(&docs))
            .unwrap_or_default();

        debug!(user = %viewer, "Room list subscription opened");
        Ok(RoomListSubscription {
            viewer: viewer.clone(),
            projection: self.clone(),
            rooms_sub,
            blocks_sub,
            users_sub,
            rooms,
            deactivated,
            initial: true,
        })
    }
}

pub struct RoomListSubscription {
    viewer: UserId,
    projection: RoomListProjection,
    rooms_sub: Subscription,
    blocks_sub: Subscription,
    users_sub: Subscription,
    rooms: Vec<ChatRoom>,
    deactivated: BTreeSet<String>,
    initial: bool,
}

impl RoomListSubscription {
    /// Wait for the next version of the list.  The first call returns the
    /// list as it stood when the subscription opened.  Returns `None` once
    /// the store goes away.
    pub async fn next(&mut self) -> Option<Result<Vec<RoomListRow>>> {
        if self.initial {
            self.initial = false;
        } else {
            // Other profile writes (counters, tokens) leave the list alone.
            loop {
                tokio::select! {
                    docs = self.rooms_sub.next() => {
                        self.rooms = decode_all(&docs?);
                        break;
                    }
                    docs = self.blocks_sub.next() => {
                        docs?;
                        break;
                    }
                    docs = self.users_sub.next() => {
                        let deactivated = snapshot_ids(&docs?);
                        if deactivated != self.deactivated {
                            self.deactivated = deactivated;
                            break;
                        }
                    }
                }
            }
        }
        Some(self.projection.project(&self.viewer, self.rooms.clone()).await)
    }

    pub fn unsubscribe(self) {}
}
