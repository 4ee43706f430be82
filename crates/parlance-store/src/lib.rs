//! # parlance-store
//!
//! Document storage for Parlance, backed by SQLite.
//!
//! Data is organised the way a hosted document database organises it:
//! collections of JSON documents addressed by path (`chatRooms/{id}`,
//! `chatRooms/{id}/messages/{mid}`), queried by field equality or array
//! containment, and observed through realtime query subscriptions that
//! redeliver the full result set after every write.  The chat core only
//! talks to the [`DocumentStore`] trait; [`Database`] is the bundled
//! implementation.

pub mod backend;
pub mod database;
pub mod document;
pub mod documents;
pub mod migrations;
pub mod subscriptions;

mod error;

pub use backend::DocumentStore;
pub use database::Database;
pub use document::*;
pub use error::{Result, StoreError};
pub use subscriptions::Subscription;
