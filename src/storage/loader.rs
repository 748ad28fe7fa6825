// storage/loader.rs
// Transactional bulk loading of enriched report rows

use std::sync::Arc;

use sqlx::{Pool, QueryBuilder, Sqlite};
use tokio::task::JoinSet;

use crate::config::{workers_for, INSERT_CHUNK_ROWS};
use crate::enrich::Enricher;
use crate::error_handling::PipelineError;
use crate::initialization::init_semaphore;
use crate::report::Report;
use crate::storage::models::{EnrichedRow, COLUMNS};

/// Streams a report's records into the database under one transaction.
///
/// Enrichment fans out across a bounded worker pool sized by record count;
/// the resulting rows are then written as chunked multi-row INSERTs inside a
/// single transaction. Either every record of the report becomes durable or
/// none do.
pub struct BulkLoader {
    pool: Arc<Pool<Sqlite>>,
    enricher: Arc<Enricher>,
}

impl BulkLoader {
    pub fn new(pool: Arc<Pool<Sqlite>>, enricher: Arc<Enricher>) -> Self {
        BulkLoader { pool, enricher }
    }

    /// Loads every record of `report`, returning the number of rows written.
    ///
    /// Row submission order across workers is not preserved; rows are
    /// independent and the target schema has no row-order dependency. Any
    /// insert or commit failure rolls the transaction back, leaving zero
    /// visible rows.
    pub async fn load(&self, report: &Report) -> Result<u64, PipelineError> {
        let rows = self.enrich_all(report).await?;

        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "INSERT INTO records ({}) ",
                COLUMNS.join(", ")
            ));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(&row.org_name)
                    .push_bind(&row.email)
                    .push_bind(&row.contact_info)
                    .push_bind(row.date_range_begin)
                    .push_bind(row.date_range_end)
                    .push_bind(&row.domain)
                    .push_bind(&row.adkim)
                    .push_bind(&row.aspf)
                    .push_bind(&row.p)
                    .push_bind(row.pct)
                    .push_bind(&row.location)
                    .push_bind(&row.source_ip)
                    .push_bind(row.count)
                    .push_bind(&row.disposition)
                    .push_bind(&row.dkim)
                    .push_bind(&row.spf)
                    .push_bind(&row.reason_type)
                    .push_bind(&row.comment)
                    .push_bind(&row.envelope_to)
                    .push_bind(&row.header_from)
                    .push_bind(&row.dkim_domain)
                    .push_bind(&row.dkim_result)
                    .push_bind(&row.dkim_hresult)
                    .push_bind(&row.spf_domain)
                    .push_bind(&row.spf_result)
                    .push_bind(&row.hostname);
            });
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(rows.len() as u64)
    }

    /// Fans record enrichment out across the bounded worker pool.
    ///
    /// The first dead worker aborts the rest; wasted enrichment after a
    /// fatal failure helps nobody.
    async fn enrich_all(&self, report: &Report) -> Result<Vec<EnrichedRow>, PipelineError> {
        let workers = workers_for(report.records.len());
        log::debug!(
            "Enriching {} records with {} workers",
            report.records.len(),
            workers
        );

        let semaphore = init_semaphore(workers);
        let mut tasks = JoinSet::new();
        for record in report.records.iter().cloned() {
            let enricher = Arc::clone(&self.enricher);
            let extra_contact = report.metadata.extra_contact_info.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let enrichment = enricher.enrich(&record.source_ip, &extra_contact).await;
                (record, enrichment)
            });
        }

        let mut rows = Vec::with_capacity(report.records.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((record, enrichment)) => rows.push(EnrichedRow::build(
                    &report.metadata,
                    &report.policy,
                    record,
                    enrichment,
                )),
                Err(e) => {
                    tasks.abort_all();
                    return Err(PipelineError::Worker(e.to_string()));
                }
            }
        }
        Ok(rows)
    }
}
