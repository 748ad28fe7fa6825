// storage/stats.rs
// Read path for aggregate statistics

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Pool, Row, Sqlite};

/// Result of a tabular query, shaped for direct JSON serialization.
#[derive(Debug, Serialize)]
pub struct StatsData {
    /// True iff every fetched row scanned cleanly
    pub success: bool,
    /// Number of rows in `records`
    pub count: i64,
    /// One column-name -> value mapping per row
    pub records: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Executes `sql` and materializes every row as a generic column mapping.
///
/// A row that fails to scan aborts iteration; the rows collected so far are
/// returned with `success = false` rather than being discarded.
pub async fn retrieve(pool: &Pool<Sqlite>, sql: &str) -> StatsData {
    let mut data = StatsData {
        success: false,
        count: 0,
        records: Vec::new(),
    };

    let rows = match sqlx::query(sql).fetch_all(pool).await {
        Ok(rows) => rows,
        Err(e) => {
            log::warn!("Stats query failed: {e}");
            return data;
        }
    };

    for row in &rows {
        match decode_row(row) {
            Ok(mapping) => {
                data.records.push(mapping);
                data.count += 1;
            }
            Err(e) => {
                log::warn!("Stats row scan failed: {e}");
                return data;
            }
        }
    }

    data.success = true;
    data
}

/// Canned aggregate: total report-record count, message volume and a
/// human-readable database size.
pub async fn database_stats(pool: &Pool<Sqlite>) -> StatsData {
    let mut data = retrieve(
        pool,
        "select count(*) as reports, coalesce(sum(records.count), 0) as total, \
         (select page_count * page_size from pragma_page_count(), pragma_page_size()) as dbsize \
         from records",
    )
    .await;

    // Pretty-print the size in place; readers get "12.3 MB", not a byte count
    for record in &mut data.records {
        if let Some(bytes) = record.get("dbsize").and_then(|v| v.as_i64()) {
            record.insert(
                "dbsize".to_string(),
                serde_json::Value::String(human_size(bytes)),
            );
        }
    }
    data
}

/// Decodes one row into a column-name -> JSON value mapping.
///
/// Cell types are dynamic; try integer, float, text and blob in turn. The
/// contract only requires JSON-serializable round-tripping, not strong
/// typing.
fn decode_row(row: &SqliteRow) -> Result<serde_json::Map<String, serde_json::Value>, sqlx::Error> {
    use serde_json::Value;

    let mut mapping = serde_json::Map::new();
    for column in row.columns() {
        let i = column.ordinal();
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<f64, _>(i) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<String, _>(i) {
            Value::String(v)
        } else if let Ok(v) = row.try_get::<Vec<u8>, _>(i) {
            Value::String(String::from_utf8_lossy(&v).into_owned())
        } else {
            return Err(sqlx::Error::ColumnDecode {
                index: column.name().to_string(),
                source: format!("unsupported value type in column {}", column.name()).into(),
            });
        };
        mapping.insert(column.name().to_string(), value);
    }
    Ok(mapping)
}

fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_db_pool, run_migrations};

    #[tokio::test]
    async fn test_retrieve_materializes_rows() {
        let pool = init_db_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        sqlx::query("INSERT INTO records (org_name, count) VALUES ('acme', 3), ('initech', 7)")
            .execute(pool.as_ref())
            .await
            .unwrap();

        let data = retrieve(&pool, "select org_name, count from records order by count").await;
        assert!(data.success);
        assert_eq!(data.count, 2);
        assert_eq!(data.records[0]["org_name"], "acme");
        assert_eq!(data.records[1]["count"], 7);
    }

    #[tokio::test]
    async fn test_retrieve_bad_sql_is_unsuccessful() {
        let pool = init_db_pool("sqlite::memory:").await.unwrap();
        let data = retrieve(&pool, "select broken from nowhere").await;
        assert!(!data.success);
        assert_eq!(data.count, 0);
        assert!(data.records.is_empty());
    }

    #[tokio::test]
    async fn test_database_stats_shape() {
        let pool = init_db_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        sqlx::query("INSERT INTO records (org_name, count) VALUES ('acme', 3)")
            .execute(pool.as_ref())
            .await
            .unwrap();

        let data = database_stats(&pool).await;
        assert!(data.success);
        assert_eq!(data.count, 1);
        let record = &data.records[0];
        assert_eq!(record["reports"], 1);
        assert_eq!(record["total"], 3);
        assert!(record["dbsize"].is_string());
    }

    #[test]
    fn test_human_size_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }
}
