//! Loads the sample books, users with orders, and countries with cities.
//!
//! Run with: cargo run --bin seed -- --only books

use clap::{Parser, ValueEnum};
use docsweep::config::database;
use docsweep::modules::{books::crud::BookCrud, countries::crud::CityCrud, users::crud::UserCrud};
use docsweep::store::MongoStore;
use tracing::info;

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dataset {
    Books,
    Users,
    Countries,
}

#[derive(Parser)]
#[command(about = "Write sample documents")]
struct Args {
    /// Datasets to load; all of them when omitted
    #[arg(long, value_enum)]
    only: Vec<Dataset>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    docsweep::init_tracing();
    let args = Args::parse();
    let wanted = |set: Dataset| args.only.is_empty() || args.only.contains(&set);

    info!("Connecting to MongoDB...");
    let store = MongoStore::new(database::connect().await?);

    if wanted(Dataset::Books) {
        let added = BookCrud::new(&store)?.add_samples().await?;
        println!("✓ Added {} books", added.len());
    }
    if wanted(Dataset::Users) {
        let users = UserCrud::new(&store)?.add_samples().await?;
        println!("✓ Added {} users with orders", users.len());
        for user in &users {
            println!("  - {}", user);
        }
    }
    if wanted(Dataset::Countries) {
        let cities = CityCrud::new(&store)?.add_samples().await?;
        println!("✓ Added {} cities", cities.len());
    }

    Ok(())
}
