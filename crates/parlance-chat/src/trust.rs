//! Blocking between users.
//!
//! Blocks are directional records (`users/{blocker}/blocked/{blocked}`), but
//! every visibility decision in the chat core checks both directions: once
//! either user blocks the other they can no longer reach each other.

use std::collections::HashSet;

use tracing::info;

use parlance_shared::constants::blocked_collection;
use parlance_shared::UserId;
use parlance_store::{to_fields, Direction, Query};

use crate::error::{ChatError, Result};
use crate::models::{now_ms, BlockRecord};
use crate::records::{block_path, decode_all, Records};

/// Live query over `user`'s own block list.
pub fn blocked_query(user: &UserId) -> Query {
    Query::collection(blocked_collection(user.as_str()))
}

#[derive(Clone)]
pub struct TrustStore {
    records: Records,
}

impl TrustStore {
    pub fn new(records: Records) -> Self {
        Self { records }
    }

    /// Block `blocked` on behalf of `blocker` and delete every room the two
    /// share, messages included.  Blocking twice keeps the original record.
    /// Returns the number of rooms removed.
    pub async fn block(
        &self,
        blocker: &UserId,
        blocked: &UserId,
        blocked_name: &str,
    ) -> Result<usize> {
        if blocker == blocked {
            return Err(ChatError::InvalidRequest("users cannot block themselves".into()));
        }

        let path = block_path(blocker, blocked);
        if self.records.store().get(&path).await?.is_none() {
            let record = BlockRecord {
                blocked_user_id: blocked.clone(),
                blocked_user_name: blocked_name.to_string(),
                created_at: now_ms(),
            };
            self.records.store().set(&path, to_fields(&record)?).await?;
        }

        let rooms = self.records.rooms_between(blocker, blocked).await?;
        for room in &rooms {
            self.records.delete_room_cascade(&room.id).await?;
        }

        info!(
            blocker = %blocker,
            blocked = %blocked,
            rooms_removed = rooms.len(),
            "User blocked"
        );
        Ok(rooms.len())
    }

    /// Remove a block.  Returns whether one existed.  Deleted rooms stay
    /// deleted.
    pub async fn unblock(&self, blocker: &UserId, blocked: &UserId) -> Result<bool> {
        let existed = self
            .records
            .store()
            .delete(&block_path(blocker, blocked))
            .await?;
        if existed {
            info!(blocker = %blocker, blocked = %blocked, "User unblocked");
        }
        Ok(existed)
    }

    /// Whether `blocker` has blocked `blocked` (one direction only).
    pub async fn is_blocked(&self, blocker: &UserId, blocked: &UserId) -> Result<bool> {
        Ok(self
            .records
            .store()
            .get(&block_path(blocker, blocked))
            .await?
            .is_some())
    }

    pub async fn is_blocked_either_direction(&self, a: &UserId, b: &UserId) -> Result<bool> {
        let (forward, backward) =
            futures::future::try_join(self.is_blocked(a, b), self.is_blocked(b, a)).await?;
        Ok(forward || backward)
    }

    /// Ids of everyone `user` has blocked.
    pub async fn list_blocked(&self, user: &UserId) -> Result<HashSet<UserId>> {
        let snaps = self.records.store().query(&blocked_query(user)).await?;
        Ok(snaps
            .iter()
            .map(|snap| UserId(snap.id().to_string()))
            .collect())
    }

    /// `user`'s block list with display names, newest first.
    pub async fn list_block_records(&self, user: &UserId) -> Result<Vec<BlockRecord>> {
        let query = blocked_query(user).order_by("createdAt", Direction::Descending);
        let snaps = self.records.store().query(&query).await?;
        Ok(decode_all(&snaps))
    }
}
