// storage/migrations.rs
// Database schema management

use sqlx::{Pool, Sqlite};

/// DDL for the fixed 26-column `records` table the bulk loader targets.
///
/// Column order matters: it is the wire contract shared with downstream
/// reporting queries and must match `models::COLUMNS`.
const CREATE_RECORDS: &str = "CREATE TABLE IF NOT EXISTS records (
    org_name TEXT,
    email TEXT,
    contact_info TEXT,
    date_range_begin INTEGER,
    date_range_end INTEGER,
    domain TEXT,
    adkim TEXT,
    aspf TEXT,
    p TEXT,
    pct INTEGER,
    location TEXT,
    source_ip TEXT,
    count INTEGER,
    disposition TEXT,
    dkim TEXT,
    spf TEXT,
    reason_type TEXT,
    comment TEXT,
    envelope_to TEXT,
    header_from TEXT,
    dkim_domain TEXT,
    dkim_result TEXT,
    dkim_hresult TEXT,
    spf_domain TEXT,
    spf_result TEXT,
    hostname TEXT
)";

/// Applies the schema. Idempotent; safe to run at every startup.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_RECORDS).execute(pool).await?;
    Ok(())
}
