//! Drops indexes and recursively deletes every top-level collection.
//!
//! Run with: cargo run --bin cleanup

use anyhow::Context;
use clap::Parser;
use docsweep::config::{database, settings::PurgeSettings};
use docsweep::services::Purger;
use docsweep::store::MongoStore;
use tracing::info;

#[derive(Parser)]
#[command(about = "Delete every collection except the skipped ones")]
struct Args {
    /// Only drop indexes, keep the documents
    #[arg(long)]
    indexes_only: bool,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    docsweep::init_tracing();
    let args = Args::parse();

    let mut settings = PurgeSettings::from_env().context("Invalid purge settings")?;
    if args.indexes_only {
        settings.delete_docs = false;
    }

    info!("Connecting to MongoDB...");
    let db = database::connect().await?;
    let store = MongoStore::new(db).with_batch_size(settings.batch_size);

    let purger = Purger::new(&store, settings.purge_options()).with_filter(settings.filter());
    let report = match settings.timeout() {
        Some(limit) => tokio::time::timeout(limit, purger.run())
            .await
            .with_context(|| format!("Purge did not finish within {:?}", limit))??,
        None => purger.run().await?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Processed collections:");
    for name in &report.processed {
        println!("  - {}", name);
    }
    println!("Skipped collections:");
    for name in &report.skipped {
        println!("  - {}", name);
    }
    println!(
        "Indexes dropped: {} ({} failed)",
        report.indexes_dropped, report.index_drop_failures
    );
    println!(
        "Documents deleted: {} across {} collections ({} failed submissions)",
        report.deleted.submitted, report.deleted.collections, report.deleted.failed_submissions
    );

    println!("\n✓ Cleanup complete!");
    Ok(())
}
