use std::collections::HashSet;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{BulkWriter, CollectionRef, DocumentRef, DocumentStore, StoreError};

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Error, Debug)]
pub enum DeleteError {
    #[error("Failed to enumerate {path}: {source}")]
    Enumeration {
        path: String,
        #[source]
        source: StoreError,
    },
    #[error("Failed to submit delete for {path}: {source}")]
    Submission {
        path: String,
        #[source]
        source: StoreError,
    },
    #[error("Collection {path} is nested deeper than {max_depth} levels")]
    DepthExceeded { path: String, max_depth: usize },
}

/// What to do when the bulk writer rejects a delete, flush or end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitErrorPolicy {
    /// Log the failure, count it, and keep going.
    #[default]
    Log,
    /// Stop the pass with [`DeleteError::Submission`].
    Abort,
}

#[derive(Debug, Clone)]
pub struct DeleteOptions {
    /// Maximum number of collection levels below (and including) the root.
    pub max_depth: usize,
    pub on_submit_error: SubmitErrorPolicy,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            on_submit_error: SubmitErrorPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteStats {
    /// Deletes accepted by a bulk writer.
    pub submitted: usize,
    /// Deletes, flushes and ends that failed under [`SubmitErrorPolicy::Log`].
    pub failed_submissions: usize,
    /// Collections walked, the root included.
    pub collections: usize,
}

impl DeleteStats {
    pub fn merge(&mut self, other: DeleteStats) {
        self.submitted += other.submitted;
        self.failed_submissions += other.failed_submissions;
        self.collections += other.collections;
    }
}

/// Deletes a collection together with every subcollection below it.
///
/// Each collection level gets its own bulk writer and visited set. A
/// document is only queued once all of its subcollections are gone.
pub struct TreeDeleter<'s, S> {
    store: &'s S,
    options: DeleteOptions,
}

impl<'s, S: DocumentStore> TreeDeleter<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self::with_options(store, DeleteOptions::default())
    }

    pub fn with_options(store: &'s S, options: DeleteOptions) -> Self {
        Self { store, options }
    }

    pub async fn delete_collection_recursive(
        &self,
        collection: &CollectionRef,
    ) -> Result<DeleteStats, DeleteError> {
        self.delete_level(collection.clone(), 0).await
    }

    fn delete_level(
        &self,
        collection: CollectionRef,
        depth: usize,
    ) -> BoxFuture<'_, Result<DeleteStats, DeleteError>> {
        async move {
            if depth >= self.options.max_depth {
                return Err(DeleteError::DepthExceeded {
                    path: collection.path().to_string(),
                    max_depth: self.options.max_depth,
                });
            }

            let mut stats = DeleteStats {
                collections: 1,
                ..DeleteStats::default()
            };
            let mut writer = self.store.bulk_writer();
            let mut visited: HashSet<String> = HashSet::new();

            loop {
                let documents = self
                    .store
                    .document_refs(&collection)
                    .await
                    .map_err(|source| enumeration(collection.path(), source))?;

                let mut scheduled = 0;
                for document in documents {
                    // One repeat means the rest of this listing was already queued.
                    if !visited.insert(document.id().to_string()) {
                        break;
                    }

                    stats.merge(self.delete_children(&document, depth).await?);

                    match writer.delete(&document).await {
                        Ok(()) => stats.submitted += 1,
                        Err(source) => self.submit_failed(document.path(), source, &mut stats)?,
                    }
                    scheduled += 1;
                }

                if scheduled == 0 {
                    if let Err(source) = writer.end().await {
                        self.submit_failed(collection.path(), source, &mut stats)?;
                    }
                    break;
                }

                debug!(collection = %collection, scheduled, "Flushing deletes");
                if let Err(source) = writer.flush().await {
                    self.submit_failed(collection.path(), source, &mut stats)?;
                }
            }

            Ok(stats)
        }
        .boxed()
    }

    async fn delete_children(
        &self,
        document: &DocumentRef,
        depth: usize,
    ) -> Result<DeleteStats, DeleteError> {
        let mut stats = DeleteStats::default();
        let children = self
            .store
            .child_collections(document)
            .await
            .map_err(|source| enumeration(document.path(), source))?;
        for child in children {
            stats.merge(self.delete_level(child, depth + 1).await?);
        }
        Ok(stats)
    }

    fn submit_failed(
        &self,
        path: &str,
        source: StoreError,
        stats: &mut DeleteStats,
    ) -> Result<(), DeleteError> {
        match self.options.on_submit_error {
            SubmitErrorPolicy::Log => {
                warn!(path, error = %source, "Delete submission failed, continuing");
                stats.failed_submissions += 1;
                Ok(())
            }
            SubmitErrorPolicy::Abort => Err(DeleteError::Submission {
                path: path.to_string(),
                source,
            }),
        }
    }
}

fn enumeration(path: &str, source: StoreError) -> DeleteError {
    DeleteError::Enumeration {
        path: path.to_string(),
        source,
    }
}
