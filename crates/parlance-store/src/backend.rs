//! The storage contract the chat core is written against.
//!
//! Every call is a suspension point for the caller.  The bundled
//! [`Database`] answers immediately from SQLite; a networked backend would
//! await its round-trip here instead.

use async_trait::async_trait;

use crate::database::Database;
use crate::document::{DocPath, FieldUpdate, Fields, Query, Snapshot};
use crate::error::Result;
use crate::subscriptions::Subscription;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id and return the id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Create or overwrite the document at `path`.
    async fn set(&self, path: &DocPath, fields: Fields) -> Result<()>;

    async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>>;

    /// Partially update an existing document.  Fails with
    /// [`StoreError::NotFound`](crate::StoreError::NotFound) if it is missing.
    async fn update(&self, path: &DocPath, updates: Vec<FieldUpdate>) -> Result<()>;

    /// Delete a document, returning whether it existed.
    async fn delete(&self, path: &DocPath) -> Result<bool>;

    async fn query(&self, query: &Query) -> Result<Vec<Snapshot>>;

    /// Open a live query.  See [`Subscription`].
    async fn subscribe(&self, query: Query) -> Result<Subscription>;
}

#[async_trait]
impl DocumentStore for Database {
    async fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        self.add_document(collection, &fields)
    }

    async fn set(&self, path: &DocPath, fields: Fields) -> Result<()> {
        self.set_document(path, &fields)
    }

    async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>> {
        self.get_document(path)
    }

    async fn update(&self, path: &DocPath, updates: Vec<FieldUpdate>) -> Result<()> {
        self.update_document(path, &updates)
    }

    async fn delete(&self, path: &DocPath) -> Result<bool> {
        self.delete_document(path)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Snapshot>> {
        self.run_query(query)
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription> {
        self.subscribe_query(query)
    }
}
