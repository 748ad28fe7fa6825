//! Database connection pool management.
//!
//! The connection string's scheme selects the backend; `sqlite` is the
//! supported SQL bulk-insert backend. The pool is opened once at startup,
//! WAL mode enabled, and shared by reference for the lifetime of the run.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::sync::Arc;

use log::{error, info};
use sqlx::{Pool, Sqlite, SqlitePool};

use crate::error_handling::DatabaseError;

/// Initializes and returns a database connection pool.
///
/// Validates the connection-string scheme, creates the database file if it
/// doesn't exist and enables WAL mode for concurrent access.
pub async fn init_db_pool(database_url: &str) -> Result<Arc<Pool<Sqlite>>, DatabaseError> {
    let (scheme, path) = database_url
        .split_once("://")
        .or_else(|| database_url.split_once(':'))
        .unwrap_or(("", database_url));

    if scheme != "sqlite" {
        return Err(DatabaseError::UnsupportedScheme(scheme.to_string()));
    }

    // In-memory databases need no file handling; used by tests
    if !path.contains(":memory:") {
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(_) => info!("Database file created successfully."),
            Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
                info!("Database file already exists.")
            }
            Err(e) => {
                error!("Failed to create database file: {e}");
                return Err(DatabaseError::FileCreationError(e.to_string()));
            }
        }
    }

    let pool = SqlitePool::connect(database_url).await.map_err(|e| {
        error!("Failed to connect to database: {e}");
        DatabaseError::SqlError(e)
    })?;

    // Enable WAL mode
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await
        .map_err(|e| {
            error!("Failed to set WAL mode: {e}");
            DatabaseError::SqlError(e)
        })?;

    Ok(Arc::new(pool))
}
