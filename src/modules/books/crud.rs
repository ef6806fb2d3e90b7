use bson::{doc, Document};
use tracing::info;

use crate::modules::books::model::{sample_books, Book, GenreRating};
use crate::store::{CollectionRef, DocumentRef, DocumentWriter, MongoStore, StoreError};

pub const COLLECTION_NAME: &str = "books";

pub struct BookCrud<'a, S> {
    store: &'a S,
    collection: CollectionRef,
}

impl<'a, S> BookCrud<'a, S> {
    pub fn new(store: &'a S) -> Result<Self, StoreError> {
        Ok(Self {
            store,
            collection: CollectionRef::root(COLLECTION_NAME)?,
        })
    }
}

impl<S: DocumentWriter> BookCrud<'_, S> {
    pub async fn create(&self, id: &str, book: &Book) -> Result<DocumentRef, StoreError> {
        let document = self.collection.doc(id)?;
        self.store.create(&document, bson::to_document(book)?).await?;
        Ok(document)
    }

    /// Creates the sample books; stops at the first book that fails.
    pub async fn add_samples(&self) -> Result<Vec<DocumentRef>, StoreError> {
        info!("Writing data to {} collection", COLLECTION_NAME);
        let mut added = Vec::new();
        for (id, book) in sample_books() {
            added.push(self.create(id, &book).await?);
            info!(id, "Added book");
        }
        Ok(added)
    }
}

impl BookCrud<'_, MongoStore> {
    pub async fn average_rating_by_genre(&self) -> Result<Vec<GenreRating>, StoreError> {
        let rows = self
            .store
            .aggregate(&self.collection, avg_rating_by_genre())
            .await?;
        rows.into_iter()
            .map(|row| bson::from_document(row).map_err(StoreError::from))
            .collect()
    }
}

pub fn avg_rating_by_genre() -> Vec<Document> {
    vec![
        doc! { "$group": { "_id": "$genre", "avg_rating": { "$avg": "$rating" } } },
        doc! { "$project": { "_id": 0, "genre": "$_id", "avg_rating": 1 } },
        doc! { "$sort": { "genre": 1 } },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_avg_rating_pipeline_groups_by_genre() {
        let pipeline = avg_rating_by_genre();
        let group = pipeline[0].get_document("$group").unwrap();
        assert_eq!(group.get_str("_id").unwrap(), "$genre");
        assert_eq!(
            group.get_document("avg_rating").unwrap().get_str("$avg").unwrap(),
            "$rating"
        );
    }

    #[tokio::test]
    async fn test_add_samples_refuses_duplicates() {
        let store = MemoryStore::new();
        let crud = BookCrud::new(&store).unwrap();

        let added = crud.add_samples().await.unwrap();
        assert_eq!(added.len(), 10);
        assert!(store.contains("books/book10").await);

        let err = crud.add_samples().await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(path) if path == "books/book1"));
    }
}
