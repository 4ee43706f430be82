//! # parlance-chat
//!
//! The realtime chat core of Parlance: chat-room lifecycle, ordered message
//! delivery with translation on receipt, content moderation at send time,
//! open topic group chats, and the blocking/reporting layer that decides
//! which rooms a user sees.
//!
//! Everything is written against the [`DocumentStore`] trait and exposed to
//! the UI layer through [`ChatClient`].
//!
//! [`DocumentStore`]: parlance_store::DocumentStore

pub mod accounts;
pub mod client;
pub mod config;
pub mod engagement;
pub mod error;
pub mod groups;
pub mod matching;
pub mod models;
pub mod push;
pub mod records;
pub mod reports;
pub mod room_list;
pub mod rooms;
pub mod stream;
pub mod translation;
pub mod trust;

#[cfg(test)]
mod test_support;

pub use client::ChatClient;
pub use config::ChatConfig;
pub use error::{ChatError, ErrorCategory, Result};
pub use groups::{GroupListSubscription, GroupMessageSubscription};
pub use models::{
    BlockRecord, ChatRoom, GroupChat, GroupMessage, GroupTopic, Message, Report, ReportReason,
    RoomStatus, User,
};
pub use room_list::{RoomListRow, RoomListSubscription};
pub use rooms::RequestOutcome;
pub use stream::{MessageSubscription, MessageView, StreamEvent};
pub use translation::{TranslationGateway, TranslationProvider};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Honours `RUST_LOG`; without it the chat core logs at debug and the store
/// at info.  Calling this twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parlance_chat=debug,parlance_store=info,warn"));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    if installed.is_ok() {
        tracing::info!("Parlance chat core v{} starting", env!("CARGO_PKG_VERSION"));
    }
}
