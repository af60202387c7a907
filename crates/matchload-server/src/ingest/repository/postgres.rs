//! PostgreSQL repository for the match_data table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};

use super::{MatchRepository, RepositoryError};
use crate::ingest::models::{MatchRecord, RunTimestamps};

/// Bind parameters per inserted row
const COLUMNS_PER_ROW: usize = 8;

/// PostgreSQL caps a statement at 65535 bind parameters
pub const MAX_ROWS_PER_STATEMENT: usize = u16::MAX as usize / COLUMNS_PER_ROW;

const INSERT_PREFIX: &str = "INSERT INTO match_data \
    (match_id, market_id, outcome_id, specifiers, date_insert, run_id, sequence_number, event_type) ";

#[derive(Debug, Clone)]
pub struct PgMatchRepository {
    pool: PgPool,
}

impl PgMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Highest numeric run id stored, 0 for an empty table.
    ///
    /// Used at startup so a restarted process does not reissue old run ids.
    pub async fn latest_run_id(&self) -> Result<u64, RepositoryError> {
        let latest: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(run_id::BIGINT), 0)
            FROM match_data
            WHERE run_id ~ '^[0-9]{1,18}$'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        u64::try_from(latest).map_err(|_| RepositoryError::OutOfRange {
            column: "run_id",
            value: latest.to_string(),
        })
    }
}

fn push_rows(records: &[MatchRecord]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(INSERT_PREFIX);
    builder.push_values(records, |mut row, record| {
        row.push_bind(&record.match_id)
            .push_bind(record.market_id)
            .push_bind(&record.outcome_id)
            .push_bind(record.specifiers.as_deref())
            .push_bind(record.inserted_at)
            .push_bind(&record.run_id)
            .push_bind(i64::from(record.sequence_number))
            .push_bind(record.kind.as_str());
    });
    builder
}

#[async_trait]
impl MatchRepository for PgMatchRepository {
    async fn insert_batch(&self, records: &[MatchRecord]) -> Result<(), RepositoryError> {
        if records.is_empty() {
            return Ok(());
        }

        // One transaction so an oversized batch split across statements is
        // still all-or-nothing
        let mut tx = self.pool.begin().await?;

        for chunk in records.chunks(MAX_ROWS_PER_STATEMENT) {
            if let Err(e) = push_rows(chunk).build().execute(&mut *tx).await {
                error!(
                    rows = chunk.len(),
                    run_id = %chunk[0].run_id,
                    error = %e,
                    "Insert into match_data failed"
                );
                return Err(e.into());
            }
        }

        tx.commit().await?;

        debug!(rows = records.len(), run_id = %records[0].run_id, "Inserted match_data rows");
        Ok(())
    }

    async fn query_timestamps(&self, run_id: &str) -> Result<RunTimestamps, RepositoryError> {
        let (min_inserted_at, max_inserted_at): (Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
            sqlx::query_as(
                r#"
                SELECT MIN(date_insert), MAX(date_insert)
                FROM match_data
                WHERE run_id = $1
                "#,
            )
            .bind(run_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(RunTimestamps {
            min_inserted_at,
            max_inserted_at,
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
