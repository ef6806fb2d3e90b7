use mongodb::{Client, Database};
use std::env;

use super::ConfigError;

pub async fn connect() -> Result<Database, ConfigError> {
    let uri = env::var("MONGODB_URI").map_err(|_| ConfigError::MissingVar("MONGODB_URI"))?;
    let db_name = env::var("MONGODB_DATABASE").unwrap_or_else(|_| "docsweep".to_string());

    let client = Client::with_uri_str(&uri).await?;

    Ok(client.database(&db_name))
}
