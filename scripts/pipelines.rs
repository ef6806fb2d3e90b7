//! Reads the sample data back through aggregation pipelines.
//!
//! Run with: cargo run --bin pipelines -- --user <id>

use clap::Parser;
use docsweep::config::database;
use docsweep::modules::{books::crud::BookCrud, users::crud::UserCrud};
use docsweep::store::MongoStore;

#[derive(Parser)]
#[command(about = "Run the sample read pipelines")]
struct Args {
    /// Also list this user's orders across every orders collection
    #[arg(long)]
    user: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    docsweep::init_tracing();
    let args = Args::parse();

    let store = MongoStore::new(database::connect().await?);

    println!("\n--- Average rating by genre ---");
    for row in BookCrud::new(&store)?.average_rating_by_genre().await? {
        println!("{:<24} {:.2}", row.genre, row.avg_rating);
    }

    let users = UserCrud::new(&store)?;
    for (i, rows) in users.read_with_pipelines().await?.iter().enumerate() {
        println!("\n\nPipeline #{}", i);
        for row in rows {
            println!("Data: {}", row);
        }
    }

    if let Some(user_id) = args.user {
        println!("\n--- Orders for user {} ---", user_id);
        for (document, order) in users.orders_for_user(&user_id).await? {
            println!(
                "  - Order ID: {}, Path: {}, Date: {}, Total: {:.2}",
                document.id(),
                document,
                order.order_date_rfc3339(),
                order.total
            );
        }
    }

    Ok(())
}
