use docsweep::modules::{books::crud::BookCrud, countries::crud::CityCrud, users::crud::UserCrud};
use docsweep::services::{PurgeOptions, Purger};
use docsweep::store::{CollectionRef, DocumentWriter, MemoryStore};

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    BookCrud::new(&store).unwrap().add_samples().await.unwrap();
    UserCrud::new(&store).unwrap().add_samples().await.unwrap();
    CityCrud::new(&store).unwrap().add_samples().await.unwrap();
    store
}

#[tokio::test]
async fn test_seed_loads_every_dataset() {
    let store = seeded_store().await;

    // 10 books, 3 users, 5 orders, 8 cities
    assert_eq!(store.len().await, 26);
}

#[tokio::test]
async fn test_purge_removes_all_sample_data() {
    let store = seeded_store().await;

    let report = Purger::new(&store, PurgeOptions::default())
        .run()
        .await
        .unwrap();

    assert!(store.is_empty().await);
    assert_eq!(report.processed, vec!["Countries", "books", "orders", "users"]);
    // 26 documents plus the 3 country documents without data
    assert_eq!(report.deleted.submitted, 29);
}

#[tokio::test]
async fn test_purge_leaves_cities_collection() {
    let store = seeded_store().await;
    let sf = CollectionRef::root("cities").unwrap().doc("SF").unwrap();
    store.set(&sf, bson::doc! { "population": 80 }).await.unwrap();

    let report = Purger::new(&store, PurgeOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.skipped, vec!["cities"]);
    assert_eq!(store.paths().await, vec!["cities/SF".to_string()]);
}
