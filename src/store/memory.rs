//! In-process document tree.
//!
//! Mirrors the implicit-collection model of the production backend: a
//! collection exists while some document lives under it, and a document id
//! is listed as long as it holds data or owns a non-empty subcollection.
//! Deletes are recorded in commit order and individual operations can be
//! made to fail, which is what the tests rely on.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bson::Document;
use tokio::sync::Mutex;

use super::{
    BulkWriter, CollectionRef, DocumentRef, DocumentStore, DocumentWriter, IndexAdmin, IndexRef,
    StoreError,
};

const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Default)]
struct State {
    documents: BTreeMap<String, Document>,
    indexes: BTreeMap<String, BTreeSet<String>>,
    failing_listings: HashSet<String>,
    failing_children: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_index_drops: HashSet<String>,
    /// Documents created right after the next listing of their collection.
    after_listing: BTreeMap<String, Vec<String>>,
    submissions: Vec<String>,
    deleted: Vec<String>,
    flushes: usize,
}

impl State {
    /// Distinct first path segments below `prefix`, in id order.
    fn segments_under(&self, prefix: &str) -> BTreeSet<String> {
        self.documents
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .filter_map(|(path, _)| path[prefix.len()..].split('/').next())
            .map(str::to_string)
            .collect()
    }

    fn commit(&mut self, pending: &mut Vec<DocumentRef>) {
        if pending.is_empty() {
            return;
        }
        for document in pending.drain(..) {
            self.documents.remove(document.path());
            self.deleted.push(document.path().to_string());
        }
        self.flushes += 1;
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    batch_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Builds a store holding an empty document at each path.
    pub fn from_paths<I, P>(paths: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let mut state = State::default();
        for path in paths {
            let document = DocumentRef::parse(path.as_ref())?;
            state
                .documents
                .insert(document.path().to_string(), Document::new());
        }
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn get(&self, document: &DocumentRef) -> Option<Document> {
        self.state.lock().await.documents.get(document.path()).cloned()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.state.lock().await.documents.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Paths of every stored document, sorted.
    pub async fn paths(&self) -> Vec<String> {
        self.state.lock().await.documents.keys().cloned().collect()
    }

    pub async fn add_index(&self, collection: &CollectionRef, name: &str) {
        self.state
            .lock()
            .await
            .indexes
            .entry(collection.path().to_string())
            .or_default()
            .insert(name.to_string());
    }

    pub async fn index_count(&self) -> usize {
        self.state.lock().await.indexes.values().map(BTreeSet::len).sum()
    }

    /// Listing the documents of this collection fails from now on.
    pub async fn fail_listing(&self, collection_path: &str) {
        self.state
            .lock()
            .await
            .failing_listings
            .insert(collection_path.to_string());
    }

    /// Enumerating the subcollections of this document fails from now on.
    pub async fn fail_children(&self, document_path: &str) {
        self.state
            .lock()
            .await
            .failing_children
            .insert(document_path.to_string());
    }

    /// Submitting a delete for this document fails from now on.
    pub async fn fail_delete(&self, document_path: &str) {
        self.state
            .lock()
            .await
            .failing_deletes
            .insert(document_path.to_string());
    }

    /// Creates an empty document once its collection has been listed again,
    /// so it shows up from the following round on.
    pub async fn insert_after_listing(&self, document_path: &str) -> Result<(), StoreError> {
        let document = DocumentRef::parse(document_path)?;
        self.state
            .lock()
            .await
            .after_listing
            .entry(document.parent().path().to_string())
            .or_default()
            .push(document.path().to_string());
        Ok(())
    }

    pub async fn fail_index_drop(&self, name: &str) {
        self.state
            .lock()
            .await
            .failing_index_drops
            .insert(name.to_string());
    }

    /// Every delete accepted by a bulk writer, in submission order.
    pub async fn submissions(&self) -> Vec<String> {
        self.state.lock().await.submissions.clone()
    }

    /// Every document removed, in commit order.
    pub async fn deleted(&self) -> Vec<String> {
        self.state.lock().await.deleted.clone()
    }

    /// Number of non-empty batches committed.
    pub async fn flushes(&self) -> usize {
        self.state.lock().await.flushes
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    type Writer = MemoryBulkWriter;

    async fn collections(&self) -> Result<Vec<CollectionRef>, StoreError> {
        let state = self.state.lock().await;
        state
            .segments_under("")
            .iter()
            .map(|id| CollectionRef::root(id))
            .collect()
    }

    async fn document_refs(
        &self,
        collection: &CollectionRef,
    ) -> Result<Vec<DocumentRef>, StoreError> {
        let mut state = self.state.lock().await;
        if state.failing_listings.contains(collection.path()) {
            return Err(StoreError::Injected(format!("list {}", collection)));
        }
        let documents: Result<Vec<DocumentRef>, StoreError> = state
            .segments_under(&format!("{}/", collection.path()))
            .iter()
            .map(|id| collection.doc(id))
            .collect();
        if let Some(paths) = state.after_listing.remove(collection.path()) {
            for path in paths {
                state.documents.insert(path, Document::new());
            }
        }
        documents
    }

    async fn child_collections(
        &self,
        document: &DocumentRef,
    ) -> Result<Vec<CollectionRef>, StoreError> {
        let state = self.state.lock().await;
        if state.failing_children.contains(document.path()) {
            return Err(StoreError::Injected(format!("collections of {}", document)));
        }
        state
            .segments_under(&format!("{}/", document.path()))
            .iter()
            .map(|id| document.collection(id))
            .collect()
    }

    fn bulk_writer(&self) -> MemoryBulkWriter {
        MemoryBulkWriter {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            batch_size: self.batch_size,
            closed: false,
        }
    }
}

pub struct MemoryBulkWriter {
    state: Arc<Mutex<State>>,
    pending: Vec<DocumentRef>,
    batch_size: usize,
    closed: bool,
}

#[async_trait]
impl BulkWriter for MemoryBulkWriter {
    async fn delete(&mut self, document: &DocumentRef) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::WriterClosed);
        }
        let mut state = self.state.lock().await;
        if state.failing_deletes.contains(document.path()) {
            return Err(StoreError::Injected(format!("delete {}", document)));
        }
        state.submissions.push(document.path().to_string());
        self.pending.push(document.clone());
        if self.pending.len() >= self.batch_size {
            state.commit(&mut self.pending);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::WriterClosed);
        }
        self.state.lock().await.commit(&mut self.pending);
        Ok(())
    }

    async fn end(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::WriterClosed);
        }
        self.closed = true;
        self.state.lock().await.commit(&mut self.pending);
        Ok(())
    }
}

#[async_trait]
impl IndexAdmin for MemoryStore {
    async fn list_indexes(&self, collection_group: &str) -> Result<Vec<IndexRef>, StoreError> {
        let state = self.state.lock().await;
        let mut indexes = Vec::new();
        for (path, names) in &state.indexes {
            let collection = CollectionRef::parse(path)?;
            if collection.id() != collection_group {
                continue;
            }
            indexes.extend(names.iter().map(|name| IndexRef {
                collection: collection.clone(),
                name: name.clone(),
            }));
        }
        Ok(indexes)
    }

    async fn drop_index(&self, index: &IndexRef) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.failing_index_drops.contains(&index.name) {
            return Err(StoreError::Injected(format!("drop index {}", index.name)));
        }
        if let Some(names) = state.indexes.get_mut(index.collection.path()) {
            names.remove(&index.name);
            if names.is_empty() {
                state.indexes.remove(index.collection.path());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentWriter for MemoryStore {
    async fn create(&self, document: &DocumentRef, data: Document) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.documents.contains_key(document.path()) {
            return Err(StoreError::AlreadyExists(document.path().to_string()));
        }
        state.documents.insert(document.path().to_string(), data);
        Ok(())
    }

    async fn set(&self, document: &DocumentRef, data: Document) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .documents
            .insert(document.path().to_string(), data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_after_listing_shows_up_next_round() {
        let store = MemoryStore::from_paths(["p/b"]).unwrap();
        store.insert_after_listing("p/a").await.unwrap();
        let p = CollectionRef::root("p").unwrap();

        let first = store.document_refs(&p).await.unwrap();
        assert_eq!(first, vec![p.doc("b").unwrap()]);

        let second = store.document_refs(&p).await.unwrap();
        assert_eq!(second, vec![p.doc("a").unwrap(), p.doc("b").unwrap()]);
    }

    #[tokio::test]
    async fn test_lists_documents_without_data() {
        let store = MemoryStore::from_paths(["Countries/France/Cities/Paris"]).unwrap();
        let countries = CollectionRef::root("Countries").unwrap();

        let refs = store.document_refs(&countries).await.unwrap();
        assert_eq!(refs, vec![countries.doc("France").unwrap()]);
        assert!(!store.contains("Countries/France").await);

        let children = store.child_collections(&refs[0]).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].path(), "Countries/France/Cities");
    }

    #[tokio::test]
    async fn test_sibling_prefixes_do_not_leak() {
        let store = MemoryStore::from_paths(["users/a", "users2/b", "users/a/orders/x"]).unwrap();
        let users = CollectionRef::root("users").unwrap();

        let refs = store.document_refs(&users).await.unwrap();
        assert_eq!(refs, vec![users.doc("a").unwrap()]);

        let roots = store.collections().await.unwrap();
        let ids: Vec<_> = roots.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["users", "users2"]);
    }

    #[tokio::test]
    async fn test_writer_batches_and_closes() {
        let store = MemoryStore::from_paths(["c/a", "c/b", "c/d"])
            .unwrap()
            .with_batch_size(2);
        let c = CollectionRef::root("c").unwrap();
        let mut writer = store.bulk_writer();

        writer.delete(&c.doc("a").unwrap()).await.unwrap();
        assert!(store.contains("c/a").await);
        writer.delete(&c.doc("b").unwrap()).await.unwrap();
        assert!(!store.contains("c/a").await);

        writer.delete(&c.doc("d").unwrap()).await.unwrap();
        writer.end().await.unwrap();
        assert!(store.is_empty().await);
        assert_eq!(store.flushes().await, 2);

        let err = writer.delete(&c.doc("a").unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::WriterClosed));
    }

    #[tokio::test]
    async fn test_create_rejects_existing() {
        let store = MemoryStore::new();
        let doc = DocumentRef::parse("books/book1").unwrap();

        store.create(&doc, bson::doc! { "title": "Dune" }).await.unwrap();
        let err = store.create(&doc, Document::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        store.set(&doc, bson::doc! { "title": "1984" }).await.unwrap();
        let stored = store.get(&doc).await.unwrap();
        assert_eq!(stored.get_str("title").unwrap(), "1984");
    }
}
