use mongodb::{bson::doc, options::IndexOptions, Client, Database, IndexModel};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::Result;

const EXPECTED_COLLECTIONS: [&str; 7] =
    ["users", "tracks", "courses", "invoices", "payments", "carts", "reviews"];

pub async fn get_db_client(config: &AppConfig) -> Result<Database> {
    let client = Client::with_uri_str(&config.database_url).await?;
    let db = client.database(&config.database_name);

    // Verify database exists by listing collections
    match db.list_collection_names().await {
        Ok(collections) => {
            info!("✅ Connected to database: {}", config.database_name);
            for name in EXPECTED_COLLECTIONS {
                if !collections.iter().any(|c| c == name) {
                    warn!("⚠️ Collection '{}' not found, it will be created on first write", name);
                }
            }
        }
        Err(e) => {
            warn!("❌ Database '{}' may be inaccessible: {}", config.database_name, e);
        }
    }

    ensure_indexes(&db).await?;
    Ok(db)
}

async fn ensure_indexes(db: &Database) -> Result<()> {
    let unique_email = IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    db.collection::<mongodb::bson::Document>("users")
        .create_index(unique_email)
        .await?;

    let one_review_per_course = IndexModel::builder()
        .keys(doc! { "userId": 1, "courseId": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    db.collection::<mongodb::bson::Document>("reviews")
        .create_index(one_review_per_course)
        .await?;

    db.collection::<mongodb::bson::Document>("courses")
        .create_index(IndexModel::builder().keys(doc! { "trackId": 1 }).build())
        .await?;

    db.collection::<mongodb::bson::Document>("invoices")
        .create_index(IndexModel::builder().keys(doc! { "userId": 1 }).build())
        .await?;

    Ok(())
}
