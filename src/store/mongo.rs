//! MongoDB backend.
//!
//! Every collection of the tree is a MongoDB collection named by its full
//! path (`Countries/France/Cities`), and documents use their string id as
//! `_id`. Subcollections of `users/alice` are therefore the collections
//! named `users/alice/<id>`.
//!
//! Ids stored as anything other than a string are listed under a
//! path-safe rendering, and the raw `_id` is kept so deletes still match.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Collection, Database};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    BulkWriter, CollectionRef, DocumentRef, DocumentStore, DocumentWriter, IndexAdmin, IndexRef,
    StoreError,
};

const DEFAULT_BATCH_SIZE: usize = 20;
const ID_INDEX: &str = "_id_";
const DUPLICATE_KEY: i32 = 11000;

fn escape_regex(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Path segment a stored `_id` is listed under.
fn listed_id(id: &Bson) -> String {
    match id {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string().replace('/', "%2F"),
    }
}

fn document_path(collection: &CollectionRef, id: &str) -> String {
    format!("{}/{}", collection.path(), id)
}

/// Values for the `$in` filter deleting `ids` from `collection`.
fn delete_values(
    collection: &CollectionRef,
    ids: &[String],
    raw_ids: &HashMap<String, Bson>,
) -> Vec<Bson> {
    ids.iter()
        .flat_map(|id| {
            let mut values = id_candidates(id);
            // A string `_id` may share its listed form with a raw one.
            if let Some(raw) = raw_ids.get(&document_path(collection, id)) {
                values.push(raw.clone());
            }
            values
        })
        .collect()
}

/// `_id` values a string id may have been stored as.
fn id_candidates(id: &str) -> Vec<Bson> {
    let mut candidates = vec![Bson::String(id.to_string())];
    if let Ok(oid) = ObjectId::parse_str(id) {
        candidates.push(Bson::ObjectId(oid));
    }
    candidates
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

/// Deletes queued per collection, in collection order.
#[derive(Debug, Default)]
struct PendingDeletes {
    groups: BTreeMap<CollectionRef, Vec<String>>,
    len: usize,
}

impl PendingDeletes {
    fn push(&mut self, document: &DocumentRef) {
        self.groups
            .entry(document.parent())
            .or_default()
            .push(document.id().to_string());
        self.len += 1;
    }

    fn pop_group(&mut self) -> Option<(CollectionRef, Vec<String>)> {
        let (collection, ids) = self.groups.pop_first()?;
        self.len -= ids.len();
        Some((collection, ids))
    }

    /// Puts back a group whose request failed.
    fn restore(&mut self, collection: CollectionRef, ids: Vec<String>) {
        self.len += ids.len();
        self.groups.entry(collection).or_default().extend(ids);
    }

    fn len(&self) -> usize {
        self.len
    }
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    batch_size: usize,
    /// Non-string `_id`s seen while listing, keyed by document path.
    raw_ids: Arc<Mutex<HashMap<String, Bson>>>,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            batch_size: DEFAULT_BATCH_SIZE,
            raw_ids: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn collection<T: Send + Sync>(&self, collection: &CollectionRef) -> Collection<T> {
        self.db.collection(collection.path())
    }

    async fn names_matching(&self, pattern: String) -> Result<Vec<String>, StoreError> {
        let names = self
            .db
            .list_collection_names()
            .filter(doc! { "name": { "$regex": pattern } })
            .await?;
        Ok(names)
    }

    /// Every collection with this id, at any depth.
    pub async fn collection_group(&self, id: &str) -> Result<Vec<CollectionRef>, StoreError> {
        let pattern = format!("^([^/]+/[^/]+/)*{}$", escape_regex(id));
        let mut names = self.names_matching(pattern).await?;
        names.sort();
        names.iter().map(|name| CollectionRef::parse(name)).collect()
    }

    /// Runs `filter` against every collection of the group and decodes the matches.
    pub async fn collection_group_find<T>(
        &self,
        id: &str,
        filter: Document,
    ) -> Result<Vec<(DocumentRef, T)>, StoreError>
    where
        T: DeserializeOwned,
    {
        let mut found = Vec::new();
        for collection in self.collection_group(id).await? {
            let mut cursor = self
                .collection::<Document>(&collection)
                .find(filter.clone())
                .await?;
            while let Some(raw) = cursor.try_next().await? {
                let doc_id = raw.get("_id").map(listed_id).unwrap_or_default();
                let document = collection.doc(&doc_id)?;
                found.push((document, bson::from_document(raw)?));
            }
        }
        Ok(found)
    }

    pub async fn aggregate(
        &self,
        collection: &CollectionRef,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .collection::<Document>(collection)
            .aggregate(pipeline)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    type Writer = MongoBulkWriter;

    async fn collections(&self) -> Result<Vec<CollectionRef>, StoreError> {
        // `Countries` exists as soon as `Countries/France/Cities` does.
        let roots: BTreeSet<String> = self
            .db
            .list_collection_names()
            .await?
            .iter()
            .filter(|name| !name.starts_with("system."))
            .filter_map(|name| name.split('/').next())
            .map(str::to_string)
            .collect();
        roots.iter().map(|id| CollectionRef::root(id)).collect()
    }

    async fn document_refs(
        &self,
        collection: &CollectionRef,
    ) -> Result<Vec<DocumentRef>, StoreError> {
        let mut cursor = self
            .collection::<Document>(collection)
            .find(doc! {})
            .projection(doc! { "_id": 1 })
            .await?;
        let mut ids = BTreeSet::new();
        let mut raw_ids = Vec::new();
        while let Some(raw) = cursor.try_next().await? {
            let Some(id) = raw.get("_id") else {
                continue;
            };
            let listed = listed_id(id);
            if !matches!(id, Bson::String(_)) {
                raw_ids.push((document_path(collection, &listed), id.clone()));
            }
            ids.insert(listed);
        }
        if !raw_ids.is_empty() {
            self.raw_ids.lock().await.extend(raw_ids);
        }

        // Ids with no document of their own that still own subcollections.
        let prefix = format!("{}/", collection.path());
        let pattern = format!("^{}[^/]+/[^/]+$", escape_regex(&prefix));
        for name in self.names_matching(pattern).await? {
            if let Some(id) = name[prefix.len()..].split('/').next() {
                ids.insert(id.to_string());
            }
        }

        ids.iter().map(|id| collection.doc(id)).collect()
    }

    async fn child_collections(
        &self,
        document: &DocumentRef,
    ) -> Result<Vec<CollectionRef>, StoreError> {
        let pattern = format!("^{}/[^/]+$", escape_regex(document.path()));
        let mut names = self.names_matching(pattern).await?;
        names.sort();
        names.iter().map(|name| CollectionRef::parse(name)).collect()
    }

    fn bulk_writer(&self) -> MongoBulkWriter {
        MongoBulkWriter {
            store: self.clone(),
            pending: PendingDeletes::default(),
            touched: BTreeSet::new(),
            closed: false,
        }
    }
}

/// Queues deletes per collection and sends each group as one `delete_many`.
///
/// On `end`, collections this writer emptied are dropped so they stop
/// showing up as subcollections.
pub struct MongoBulkWriter {
    store: MongoStore,
    pending: PendingDeletes,
    touched: BTreeSet<CollectionRef>,
    closed: bool,
}

impl MongoBulkWriter {
    /// Sends every queued group. A failed group and the ones after it stay queued.
    async fn send(&mut self) -> Result<(), StoreError> {
        while let Some((collection, ids)) = self.pending.pop_group() {
            let values = delete_values(&collection, &ids, &*self.store.raw_ids.lock().await);
            let result = match self
                .store
                .collection::<Document>(&collection)
                .delete_many(doc! { "_id": { "$in": values } })
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    self.pending.restore(collection, ids);
                    return Err(e.into());
                }
            };

            let mut raw_ids = self.store.raw_ids.lock().await;
            for id in &ids {
                raw_ids.remove(&document_path(&collection, id));
            }
            drop(raw_ids);

            debug!(
                collection = %collection,
                requested = ids.len(),
                deleted = result.deleted_count,
                "Sent delete batch"
            );
            self.touched.insert(collection);
        }
        Ok(())
    }
}

#[async_trait]
impl BulkWriter for MongoBulkWriter {
    async fn delete(&mut self, document: &DocumentRef) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::WriterClosed);
        }
        self.pending.push(document);
        if self.pending.len() >= self.store.batch_size {
            self.send().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::WriterClosed);
        }
        self.send().await
    }

    async fn end(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::WriterClosed);
        }
        self.closed = true;
        self.send().await?;
        for collection in std::mem::take(&mut self.touched) {
            let handle = self.store.collection::<Document>(&collection);
            if handle.count_documents(doc! {}).await? == 0 {
                handle.drop().await?;
                debug!(collection = %collection, "Dropped emptied collection");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl IndexAdmin for MongoStore {
    async fn list_indexes(&self, collection_group: &str) -> Result<Vec<IndexRef>, StoreError> {
        let mut indexes = Vec::new();
        for collection in self.collection_group(collection_group).await? {
            let names = self
                .collection::<Document>(&collection)
                .list_index_names()
                .await?;
            indexes.extend(
                names
                    .into_iter()
                    .filter(|name| name != ID_INDEX)
                    .map(|name| IndexRef {
                        collection: collection.clone(),
                        name,
                    }),
            );
        }
        Ok(indexes)
    }

    async fn drop_index(&self, index: &IndexRef) -> Result<(), StoreError> {
        self.collection::<Document>(&index.collection)
            .drop_index(&index.name)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentWriter for MongoStore {
    async fn create(&self, document: &DocumentRef, mut data: Document) -> Result<(), StoreError> {
        data.insert("_id", document.id());
        match self
            .collection::<Document>(&document.parent())
            .insert_one(data)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(StoreError::AlreadyExists(document.path().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, document: &DocumentRef, mut data: Document) -> Result<(), StoreError> {
        data.insert("_id", document.id());
        self.collection::<Document>(&document.parent())
            .replace_one(doc! { "_id": document.id() }, data)
            .upsert(true)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex("users"), "users");
        assert_eq!(escape_regex("a.b/c+d"), "a\\.b/c\\+d");
        assert_eq!(escape_regex("(x)[y]"), "\\(x\\)\\[y\\]");
    }

    #[test]
    fn test_id_candidates_include_object_ids() {
        assert_eq!(id_candidates("book1"), vec![Bson::String("book1".into())]);

        let oid = ObjectId::new();
        let candidates = id_candidates(&oid.to_hex());
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1], Bson::ObjectId(oid));
    }

    #[test]
    fn test_listed_id() {
        assert_eq!(listed_id(&Bson::String("x".into())), "x");
        let oid = ObjectId::new();
        assert_eq!(listed_id(&Bson::ObjectId(oid)), oid.to_hex());
        assert_eq!(listed_id(&Bson::Int32(42)), "42");
    }

    #[test]
    fn test_non_string_ids_are_deleted_by_raw_value() {
        let collection = CollectionRef::root("legacy").unwrap();
        let stored = [
            Bson::Int32(42),
            Bson::Int64(7),
            Bson::Double(1.5),
            Bson::Document(doc! { "region": "eu/west", "n": 1 }),
        ];

        let mut raw_ids = HashMap::new();
        let mut listed = Vec::new();
        for id in &stored {
            let segment = listed_id(id);
            let document = collection.doc(&segment).unwrap();
            raw_ids.insert(document.path().to_string(), id.clone());
            listed.push(segment);
        }

        let values = delete_values(&collection, &listed, &raw_ids);
        for id in &stored {
            assert!(values.contains(id), "missing {id}");
        }
        assert!(values.contains(&Bson::String("42".into())));
    }

    #[test]
    fn test_string_ids_without_raw_value_use_candidates() {
        let collection = CollectionRef::root("books").unwrap();
        let values = delete_values(&collection, &["book1".to_string()], &HashMap::new());
        assert_eq!(values, vec![Bson::String("book1".into())]);
    }

    #[test]
    fn test_restored_group_is_sent_again() {
        let mut pending = PendingDeletes::default();
        for path in ["a/1", "a/2", "b/1", "c/1"] {
            pending.push(&DocumentRef::parse(path).unwrap());
        }
        assert_eq!(pending.len(), 4);

        let (first, ids) = pending.pop_group().unwrap();
        assert_eq!(first.path(), "a");
        assert_eq!(pending.len(), 2);

        pending.restore(first, ids);
        assert_eq!(pending.len(), 4);

        let order: Vec<String> = std::iter::from_fn(|| pending.pop_group())
            .map(|(collection, ids)| format!("{}:{}", collection, ids.len()))
            .collect();
        assert_eq!(order, vec!["a:2", "b:1", "c:1"]);
        assert_eq!(pending.len(), 0);
    }
}
