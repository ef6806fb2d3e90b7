pub mod purge;
pub mod tree_deleter;

pub use purge::{skip_named, CollectionFilter, PurgeError, PurgeOptions, PurgeReport, Purger};
pub use tree_deleter::{DeleteError, DeleteOptions, DeleteStats, SubmitErrorPolicy, TreeDeleter};
