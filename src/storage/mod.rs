// storage/mod.rs
// Database operations module

pub mod loader;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod stats;

// Re-export commonly used items
pub use loader::BulkLoader;
pub use migrations::run_migrations;
pub use models::EnrichedRow;
pub use pool::init_db_pool;
pub use stats::{database_stats, retrieve, StatsData};
