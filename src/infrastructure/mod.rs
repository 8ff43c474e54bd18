// Core infrastructure modules
pub mod connection_cache; // Shared lazily-established connection
pub mod database; // Database handle and collection DDL

pub use connection_cache::{
    connect_to_database, init_global_connection, init_global_connection_from_env,
    reset_global_connection, ConnectionCache, Connector, UrlConnector,
};
pub use database::{is_unique_violation, Database};
