use event_booking_store::config::{Config, DatabaseConfig};
use event_booking_store::entities::EventStore;
use event_booking_store::infrastructure::{
    connect_to_database, init_global_connection, init_global_connection_from_env,
    reset_global_connection,
};
use event_booking_store::AppError;

// Single test: the process-wide cache is shared by everything in this binary.
#[tokio::test]
async fn test_global_connection_lifecycle() {
    std::env::remove_var("DATABASE_URL");
    assert!(matches!(
        init_global_connection_from_env().await,
        Err(AppError::Configuration(_))
    ));

    let err = connect_to_database().await.unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("events.db").display());
    let config = Config {
        database: DatabaseConfig::new(url).unwrap(),
    };

    let cache = init_global_connection(&config).await.unwrap();
    assert!(init_global_connection(&config).await.is_err());

    let (a, b) = tokio::join!(connect_to_database(), connect_to_database());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(cache.attempts().await, 1);

    // Collections were created by the connector; both handles see the same store
    EventStore::new(a.clone()).count().await.unwrap();
    connect_to_database().await.unwrap();
    assert_eq!(cache.attempts().await, 1);

    reset_global_connection().await;
    assert!(a.is_closed() && b.is_closed());
    assert!(matches!(
        connect_to_database().await,
        Err(AppError::Internal(_))
    ));
}
