//! Basic usage example of the cache store.

use cache_store::{
    client::InMemoryClient, error::Result, CacheStore, ClientOptions, ErrorKind, Schema,
    StoreConfig, StoreService,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Cache Store - Basic Example ===\n");

    // 1. Build the store
    println!("1. Initializing in-memory cache client...");
    let config = StoreConfig::new("").with_options(ClientOptions::default().with_lifetime(300));
    let store = CacheStore::<InMemoryClient>::connect(config)?;
    let service = StoreService::new(store);
    println!("   ✓ Store ready (lifetime: {})\n", service.store().lifetime());

    // 2. Define a model
    println!("2. Defining model 'employment':");
    service.define(
        "employment",
        Schema::from_definition(&json!({
            "id":            { "type": "String", "primaryKey": true },
            "employer_name": { "type": "String" },
            "salary":        { "type": "Number" }
        }))?,
    );
    println!("   ✓ Model defined\n");

    // 3. Create
    println!("3. Creating employment emp_001:");
    let created = service
        .create(
            "employment",
            json!({ "id": "emp_001", "employer_name": "Acme Corp", "salary": 75000.0 }),
        )
        .await?;
    println!("   ✓ Stored under {} for {}\n", created.key, created.lifetime);

    // 4. Read
    println!("4. Reading employment emp_001:");
    let employment = service.get("employment", "emp_001").await?;
    println!("   ✓ Loaded: {}\n", employment);

    // 5. Unsupported operations
    println!("5. Updating employment emp_001:");
    if let Err(e) = service
        .update("employment", json!({ "id": "emp_001", "salary": 80000.0 }))
        .await
    {
        println!("   ✓ Rejected as expected: {}\n", e);
    }

    // 6. Delete
    println!("6. Deleting employment emp_001:");
    let key = service
        .delete("employment", &json!({ "id": "emp_001" }))
        .await?;
    println!("   ✓ Deleted {}", key);

    match service.get("employment", "emp_001").await {
        Err(e) if e.kind() == ErrorKind::NotFound => println!("   ✓ {}\n", e),
        other => println!("   ✗ Unexpected result: {:?}\n", other),
    }

    println!("=== Example Complete ===\n");

    Ok(())
}
