use mongodb::{Client, Database};

pub async fn get_db_client(database_url: &str, db_name: &str) -> Database {
    let client = Client::with_uri_str(database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db = client.database(db_name);

    // Verify the database is reachable by listing collections
    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("✅ Connected to database: {}", db_name);
            tracing::debug!("📂 Collections found: {:?}", collections);
        }
        Err(e) => {
            tracing::error!(
                "❌ Database '{}' may not exist or is inaccessible: {}",
                db_name,
                e
            );
        }
    }

    db
}
