use docsweep::services::{PurgeError, PurgeOptions, Purger};
use docsweep::store::{CollectionRef, MemoryStore};

fn sample_store() -> MemoryStore {
    MemoryStore::from_paths([
        "books/b1",
        "cities/sf",
        "cities/sf/landmarks/bridge",
        "users/a",
        "users/a/cities/x",
        "users/a/books/fav",
    ])
    .unwrap()
}

#[tokio::test]
async fn test_skips_top_level_cities_only() {
    let store = sample_store();

    let report = Purger::new(&store, PurgeOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.processed, vec!["books", "users"]);
    assert_eq!(report.skipped, vec!["cities"]);
    assert_eq!(
        store.paths().await,
        vec!["cities/sf".to_string(), "cities/sf/landmarks/bridge".to_string()]
    );
    assert!(!store
        .submissions()
        .await
        .iter()
        .any(|p| p.starts_with("cities/")));
}

#[tokio::test]
async fn test_skip_is_case_sensitive() {
    let store = MemoryStore::from_paths(["Cities/x", "cities/y"]).unwrap();

    let report = Purger::new(&store, PurgeOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.processed, vec!["Cities"]);
    assert_eq!(store.paths().await, vec!["cities/y".to_string()]);
}

#[tokio::test]
async fn test_drops_indexes_of_whole_collection_group() {
    let store = sample_store();
    store
        .add_index(&CollectionRef::parse("books").unwrap(), "title_1")
        .await;
    store
        .add_index(&CollectionRef::parse("users/a/books").unwrap(), "rank_1")
        .await;
    store
        .add_index(&CollectionRef::parse("cities").unwrap(), "population_1")
        .await;

    let report = Purger::new(&store, PurgeOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.indexes_dropped, 2);
    assert_eq!(report.index_drop_failures, 0);
    assert_eq!(store.index_count().await, 1);
}

#[tokio::test]
async fn test_index_drop_failure_does_not_stop_the_run() {
    let store = sample_store();
    store
        .add_index(&CollectionRef::parse("books").unwrap(), "title_1")
        .await;
    store.fail_index_drop("title_1").await;

    let report = Purger::new(&store, PurgeOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.index_drop_failures, 1);
    assert_eq!(report.indexes_dropped, 0);
    assert!(!store.contains("books/b1").await);
}

#[tokio::test]
async fn test_keeps_documents_when_deletion_disabled() {
    let store = sample_store();
    store
        .add_index(&CollectionRef::parse("users").unwrap(), "email_1")
        .await;
    let options = PurgeOptions {
        delete_docs: false,
        ..PurgeOptions::default()
    };

    let report = Purger::new(&store, options).run().await.unwrap();

    assert_eq!(report.indexes_dropped, 1);
    assert_eq!(report.deleted.submitted, 0);
    assert_eq!(store.len().await, 6);
}

#[tokio::test]
async fn test_custom_filter() {
    let store = sample_store();

    let report = Purger::new(&store, PurgeOptions::default())
        .with_filter(Box::new(|c: &CollectionRef| c.id() == "users"))
        .run()
        .await
        .unwrap();

    assert_eq!(report.processed, vec!["users"]);
    assert_eq!(report.skipped, vec!["books", "cities"]);
    assert!(store.contains("books/b1").await);
    assert!(!store.contains("users/a/cities/x").await);
}

#[tokio::test]
async fn test_delete_failure_aborts_the_run() {
    let store = sample_store();
    store.fail_listing("books").await;

    let err = Purger::new(&store, PurgeOptions::default())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, PurgeError::Delete { ref collection, .. } if collection == "books"));
    assert!(store.contains("users/a").await);
}
