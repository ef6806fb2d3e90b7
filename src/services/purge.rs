use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::services::tree_deleter::{DeleteError, DeleteOptions, DeleteStats, TreeDeleter};
use crate::store::{CollectionRef, DocumentStore, IndexAdmin, StoreError};

/// Top-level collection left alone unless the caller supplies another filter.
pub const DEFAULT_SKIPPED_COLLECTION: &str = "cities";

/// Returns `true` for top-level collections the purge should enter.
pub type CollectionFilter = Box<dyn Fn(&CollectionRef) -> bool + Send + Sync>;

/// Filter that skips collections whose id equals one of `names` (case-sensitive).
pub fn skip_named<I, N>(names: I) -> CollectionFilter
where
    I: IntoIterator<Item = N>,
    N: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    Box::new(move |collection: &CollectionRef| !names.iter().any(|name| name == collection.id()))
}

#[derive(Error, Debug)]
pub enum PurgeError {
    #[error("Failed to list collections: {0}")]
    ListCollections(#[source] StoreError),
    #[error("Failed to list indexes of collection group {group}: {source}")]
    ListIndexes {
        group: String,
        #[source]
        source: StoreError,
    },
    #[error("Failed to delete collection {collection}: {source}")]
    Delete {
        collection: String,
        #[source]
        source: DeleteError,
    },
}

#[derive(Debug, Clone)]
pub struct PurgeOptions {
    /// Run the tree deleter after dropping indexes.
    pub delete_docs: bool,
    pub delete: DeleteOptions,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            delete_docs: true,
            delete: DeleteOptions::default(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct PurgeReport {
    pub processed: Vec<String>,
    pub skipped: Vec<String>,
    pub indexes_dropped: usize,
    pub index_drop_failures: usize,
    pub deleted: DeleteStats,
}

/// Drops indexes and deletes documents of every top-level collection.
pub struct Purger<'s, S> {
    store: &'s S,
    filter: CollectionFilter,
    options: PurgeOptions,
}

impl<'s, S> Purger<'s, S>
where
    S: DocumentStore + IndexAdmin,
{
    pub fn new(store: &'s S, options: PurgeOptions) -> Self {
        Self {
            store,
            filter: skip_named([DEFAULT_SKIPPED_COLLECTION]),
            options,
        }
    }

    pub fn with_filter(mut self, filter: CollectionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub async fn run(&self) -> Result<PurgeReport, PurgeError> {
        let mut report = PurgeReport::default();
        let collections = self
            .store
            .collections()
            .await
            .map_err(PurgeError::ListCollections)?;

        for collection in collections {
            info!(collection = %collection, "Found collection");
            if !(self.filter)(&collection) {
                info!(collection = %collection, "Skipping collection");
                report.skipped.push(collection.id().to_string());
                continue;
            }

            self.drop_indexes(collection.id(), &mut report).await?;

            if self.options.delete_docs {
                let deleter = TreeDeleter::with_options(self.store, self.options.delete.clone());
                match deleter.delete_collection_recursive(&collection).await {
                    Ok(stats) => {
                        info!(
                            collection = %collection,
                            submitted = stats.submitted,
                            failed = stats.failed_submissions,
                            "Deleted collection"
                        );
                        report.deleted.merge(stats);
                    }
                    Err(source) => {
                        error!(collection = %collection, error = %source, "Failed to delete collection");
                        return Err(PurgeError::Delete {
                            collection: collection.id().to_string(),
                            source,
                        });
                    }
                }
            }
            report.processed.push(collection.id().to_string());
        }

        Ok(report)
    }

    async fn drop_indexes(&self, group: &str, report: &mut PurgeReport) -> Result<(), PurgeError> {
        let indexes = self
            .store
            .list_indexes(group)
            .await
            .map_err(|source| PurgeError::ListIndexes {
                group: group.to_string(),
                source,
            })?;

        for index in indexes {
            info!(collection = %index.collection, index = %index.name, "Found index");
            match self.store.drop_index(&index).await {
                Ok(()) => {
                    info!(index = %index.name, "Deleted index");
                    report.indexes_dropped += 1;
                }
                Err(e) => {
                    warn!(index = %index.name, error = %e, "Failed to delete index");
                    report.index_drop_failures += 1;
                }
            }
        }
        Ok(())
    }
}
