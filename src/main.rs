// Event booking store - connects, ensures collections exist and reports their size

use tracing::info;
use tracing_subscriber::EnvFilter;

use event_booking_store::{
    config::Config,
    entities::EventStore,
    infrastructure::{connect_to_database, init_global_connection, reset_global_connection},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration; a missing DATABASE_URL stops here
    let config = Config::from_env()?;
    init_global_connection(&config).await?;

    let db = connect_to_database().await?;
    db.health_check().await?;

    let events = EventStore::new(db.clone());
    let (idle, size) = db.pool_stats();
    info!(events = events.count().await?, idle, size, "Event store ready");

    reset_global_connection().await;
    Ok(())
}
