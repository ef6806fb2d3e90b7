use thiserror::Error;

pub mod database;
pub mod settings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(&'static str),
    #[error("Invalid value {value:?} for {name}")]
    InvalidVar { name: &'static str, value: String },
    #[error("Invalid settings: {0}")]
    Invalid(#[from] validator::ValidationErrors),
    #[error("Failed to connect to MongoDB: {0}")]
    Client(#[from] mongodb::error::Error),
}
