use thiserror::Error;

use parlance_shared::{RejectReason, RoomId, UserId};
use parlance_store::StoreError;

use crate::models::RoomStatus;

/// Errors surfaced by chat-core operations.
///
/// Translation and push failures never appear here: both degrade locally.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Message rejected: {0}")]
    ContentRejected(RejectReason),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Room {room} is {status}, cannot {action}")]
    InvalidTransition {
        room: RoomId,
        status: RoomStatus,
        action: &'static str,
    },

    #[error("{field} is already in use: {value}")]
    NameTaken { field: &'static str, value: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("User {0} has deleted their account")]
    UserDeleted(UserId),

    #[error("Account {0} has been deleted")]
    AccountDeleted(UserId),

    #[error("{user} is not a participant of room {room}")]
    NotParticipant { user: UserId, room: RoomId },

    #[error("The requester cannot answer their own request in room {0}")]
    RequesterCannotRespond(RoomId),

    #[error("Conversation unavailable: one participant has blocked the other")]
    Blocked,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// How a caller should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input; report it, never retry.
    Validation,
    /// The addressed room, user or message is gone.
    NotFound,
    /// The acting user may not do this.
    Permission,
    /// Store or network trouble; safe to retry.
    Transient,
}

impl ChatError {
    pub(crate) fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        ChatError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ChatError::ContentRejected(_)
            | ChatError::InvalidRequest(_)
            | ChatError::InvalidTransition { .. }
            | ChatError::NameTaken { .. } => ErrorCategory::Validation,
            ChatError::NotFound { .. } | ChatError::UserDeleted(_) => ErrorCategory::NotFound,
            ChatError::AccountDeleted(_)
            | ChatError::NotParticipant { .. }
            | ChatError::RequesterCannotRespond(_)
            | ChatError::Blocked => ErrorCategory::Permission,
            // An undecodable document is as good as absent to the caller.
            ChatError::Store(StoreError::NotFound(_) | StoreError::Malformed { .. }) => {
                ErrorCategory::NotFound
            }
            ChatError::Store(_) => ErrorCategory::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;
