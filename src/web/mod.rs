//! JSON stats endpoint.
//!
//! A small axum server exposing `GET /api/stats`, the read path over the
//! same database the bulk loader writes. Runs in the background and never
//! blocks report processing.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::{Pool, Sqlite};

use crate::storage::{database_stats, StatsData};

/// Creates and starts the stats server.
pub async fn start_stats_server(port: u16, pool: Arc<Pool<Sqlite>>) -> Result<(), anyhow::Error> {
    let app = Router::new()
        .route("/api/stats", get(stats_handler))
        .with_state(pool);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind stats server to port {}: {}", port, e))?;

    log::info!("Stats server listening on http://127.0.0.1:{}/api/stats", port);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Stats server error: {}", e))?;

    Ok(())
}

async fn stats_handler(State(pool): State<Arc<Pool<Sqlite>>>) -> Json<StatsData> {
    Json(database_stats(&pool).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_db_pool, run_migrations};

    #[tokio::test]
    async fn test_stats_handler_serializes() {
        let pool = init_db_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let Json(data) = stats_handler(State(pool)).await;
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["success"], true);
        assert!(json["records"].is_array());
    }
}
