use std::env;
use std::str::FromStr;
use std::time::Duration;

use validator::Validate;

use super::ConfigError;
use crate::services::purge::{skip_named, CollectionFilter, PurgeOptions, DEFAULT_SKIPPED_COLLECTION};
use crate::services::tree_deleter::{DeleteOptions, SubmitErrorPolicy, DEFAULT_MAX_DEPTH};

/// Purge settings read from `PURGE_*` environment variables.
#[derive(Debug, Clone, Validate)]
pub struct PurgeSettings {
    #[validate(range(min = 1, max = 500, message = "Batch size must be between 1 and 500"))]
    pub batch_size: usize,
    #[validate(range(min = 1, max = 1024, message = "Max depth must be between 1 and 1024"))]
    pub max_depth: usize,
    pub delete_docs: bool,
    pub skip_collections: Vec<String>,
    pub on_submit_error: SubmitErrorPolicy,
    #[validate(range(min = 1, message = "Timeout must be at least one second"))]
    pub timeout_secs: Option<u64>,
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_depth: DEFAULT_MAX_DEPTH,
            delete_docs: true,
            skip_collections: vec![DEFAULT_SKIPPED_COLLECTION.to_string()],
            on_submit_error: SubmitErrorPolicy::Log,
            timeout_secs: None,
        }
    }
}

impl PurgeSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds settings from any variable source and validates them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(v) = lookup("PURGE_BATCH_SIZE") {
            settings.batch_size = parse("PURGE_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("PURGE_MAX_DEPTH") {
            settings.max_depth = parse("PURGE_MAX_DEPTH", &v)?;
        }
        if let Some(v) = lookup("PURGE_DELETE_DOCS") {
            settings.delete_docs = parse("PURGE_DELETE_DOCS", &v)?;
        }
        if let Some(v) = lookup("PURGE_SKIP_COLLECTIONS") {
            settings.skip_collections = v
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("PURGE_ON_SUBMIT_ERROR") {
            settings.on_submit_error = match v.trim() {
                "log" => SubmitErrorPolicy::Log,
                "abort" => SubmitErrorPolicy::Abort,
                _ => {
                    return Err(ConfigError::InvalidVar {
                        name: "PURGE_ON_SUBMIT_ERROR",
                        value: v,
                    })
                }
            };
        }
        if let Some(v) = lookup("PURGE_TIMEOUT_SECS") {
            settings.timeout_secs = Some(parse("PURGE_TIMEOUT_SECS", &v)?);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn purge_options(&self) -> PurgeOptions {
        PurgeOptions {
            delete_docs: self.delete_docs,
            delete: DeleteOptions {
                max_depth: self.max_depth,
                on_submit_error: self.on_submit_error,
            },
        }
    }

    pub fn filter(&self) -> CollectionFilter {
        skip_named(self.skip_collections.clone())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidVar {
        name,
        value: value.to_string(),
    })
}
