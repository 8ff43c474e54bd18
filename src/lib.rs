// Event booking store - event and booking records over a shared document database

// Configuration
pub mod config;

// Core types and primitives
pub mod core;

// Database handle and connection cache
pub mod infrastructure;

// Collection schemas and pre-persist hooks
pub mod schemas;

// Records and stores
pub mod entities;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
