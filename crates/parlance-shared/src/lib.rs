//! # parlance-shared
//!
//! Types shared by every Parlance crate: identifiers, the supported language
//! set, collection names and tuning constants, the local content moderator
//! and the script/keyword language detector.

pub mod constants;
pub mod error;
pub mod language;
pub mod moderation;
pub mod types;

pub use error::{IdError, ParlanceError};
pub use language::{detect_language, Language};
pub use moderation::{ContentModerator, ModerationVerdict, RejectReason};
pub use types::{GroupId, MessageId, ReportId, RoomId, UserId};
