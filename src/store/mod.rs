//! Seams to the external document database.
//!
//! The tree deleter and purge driver only talk to these traits; the
//! [`mongo`] backend maps them onto MongoDB and the [`memory`] backend keeps
//! an in-process tree for tests.

use async_trait::async_trait;
use bson::Document;
use thiserror::Error;

pub mod memory;
pub mod mongo;
mod refs;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use refs::{CollectionRef, DocumentRef};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("Failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),
    #[error("Failed to decode document: {0}")]
    Decode(#[from] bson::de::Error),
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),
    #[error("Document already exists: {0}")]
    AlreadyExists(String),
    #[error("Bulk writer already ended")]
    WriterClosed,
    #[error("Injected failure: {0}")]
    Injected(String),
}

/// Read side of the database, plus the bulk-write channel used for deletes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    type Writer: BulkWriter;

    /// Top-level collections.
    async fn collections(&self) -> Result<Vec<CollectionRef>, StoreError>;

    /// Every document reference in the collection, including documents that
    /// hold no data but own subcollections.
    async fn document_refs(&self, collection: &CollectionRef)
        -> Result<Vec<DocumentRef>, StoreError>;

    async fn child_collections(&self, document: &DocumentRef)
        -> Result<Vec<CollectionRef>, StoreError>;

    /// Opens a fresh bulk writer. Writers are not shared between passes.
    fn bulk_writer(&self) -> Self::Writer;
}

/// Batches deletes into grouped requests.
///
/// Queued deletes are sent when the batch fills up, on `flush`, and on
/// `end`. Once ended, every call returns [`StoreError::WriterClosed`].
#[async_trait]
pub trait BulkWriter: Send {
    async fn delete(&mut self, document: &DocumentRef) -> Result<(), StoreError>;

    async fn flush(&mut self) -> Result<(), StoreError>;

    async fn end(&mut self) -> Result<(), StoreError>;
}

/// Secondary index on one concrete collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRef {
    pub collection: CollectionRef,
    pub name: String,
}

#[async_trait]
pub trait IndexAdmin: Send + Sync {
    /// Indexes of every collection with this id, at any depth.
    async fn list_indexes(&self, collection_group: &str) -> Result<Vec<IndexRef>, StoreError>;

    async fn drop_index(&self, index: &IndexRef) -> Result<(), StoreError>;
}

/// Write side used for loading sample data.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    /// Fails with [`StoreError::AlreadyExists`] if the document exists.
    async fn create(&self, document: &DocumentRef, data: Document) -> Result<(), StoreError>;

    /// Creates or overwrites.
    async fn set(&self, document: &DocumentRef, data: Document) -> Result<(), StoreError>;

    /// Creates a document under a generated id.
    async fn add(
        &self,
        collection: &CollectionRef,
        data: Document,
    ) -> Result<DocumentRef, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let document = collection.doc(&id)?;
        self.create(&document, data).await?;
        Ok(document)
    }
}
