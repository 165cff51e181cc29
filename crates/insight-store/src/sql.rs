use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use insight_core::{
    CacheEntry, CacheStore, Clock, JobState, ResourceKind, StoreError, StoreResult, SystemClock,
    TranscriptEntry,
};

use crate::db::CacheDb;

const STATE_RUNNING: &str = "running";
const STATE_FAILED: &str = "failed";

/// Table layout for one resource kind. Kinds never share a table.
struct KindTable {
    table: &'static str,
    key: &'static str,
    payload: &'static str,
}

fn table_for(kind: ResourceKind) -> KindTable {
    match kind {
        ResourceKind::VideoSummary => KindTable {
            table: "summaries",
            key: "video_id",
            payload: "content",
        },
        ResourceKind::TradingInsight => KindTable {
            table: "trading_insights",
            key: "symbol",
            payload: "insight",
        },
    }
}

fn storage_err(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(e.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Decode(format!("timestamp out of range: {ms}")))
}

fn entry_from_row((key, payload, generated_at): (String, String, i64)) -> StoreResult<CacheEntry> {
    Ok(CacheEntry {
        key,
        payload,
        generated_at: from_millis(generated_at)?,
    })
}

/// `CacheStore` backed by the relational database.
#[derive(Clone)]
pub struct SqlCacheStore {
    db: CacheDb,
    clock: Arc<dyn Clock>,
}

impl SqlCacheStore {
    pub fn new(db: CacheDb) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: CacheDb, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }
}

#[async_trait]
impl CacheStore for SqlCacheStore {
    async fn get_any(&self, kind: ResourceKind, key: &str) -> StoreResult<Option<CacheEntry>> {
        let t = table_for(kind);
        let sql = format!(
            "SELECT {key}, {payload}, generated_at FROM {table} WHERE {key} = $1",
            key = t.key,
            payload = t.payload,
            table = t.table,
        );

        let row: Option<(String, String, i64)> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(self.db.pool())
            .await
            .map_err(storage_err)?;

        row.map(entry_from_row).transpose()
    }

    async fn get_fresh(
        &self,
        kind: ResourceKind,
        key: &str,
        max_age: Duration,
    ) -> StoreResult<Option<CacheEntry>> {
        let t = table_for(kind);
        let sql = format!(
            "SELECT {key}, {payload}, generated_at FROM {table} WHERE {key} = $1 AND generated_at >= $2",
            key = t.key,
            payload = t.payload,
            table = t.table,
        );
        let cutoff = (self.clock.now() - max_age).timestamp_millis();

        let row: Option<(String, String, i64)> = sqlx::query_as(&sql)
            .bind(key)
            .bind(cutoff)
            .fetch_optional(self.db.pool())
            .await
            .map_err(storage_err)?;

        row.map(entry_from_row).transpose()
    }

    async fn get_many(&self, kind: ResourceKind, keys: &[String]) -> StoreResult<Vec<CacheEntry>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let t = table_for(kind);
        let placeholders = (1..=keys.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {key}, {payload}, generated_at FROM {table} WHERE {key} IN ({placeholders})",
            key = t.key,
            payload = t.payload,
            table = t.table,
        );

        let mut query = sqlx::query_as::<_, (String, String, i64)>(&sql);
        for key in keys {
            query = query.bind(key);
        }

        let rows = query
            .fetch_all(self.db.pool())
            .await
            .map_err(storage_err)?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn upsert(&self, kind: ResourceKind, key: &str, payload: &str) -> StoreResult<CacheEntry> {
        let t = table_for(kind);
        let sql = format!(
            "INSERT INTO {table} ({key}, {payload}, generated_at) VALUES ($1, $2, $3)
             ON CONFLICT ({key}) DO UPDATE
             SET {payload} = excluded.{payload}, generated_at = excluded.generated_at",
            key = t.key,
            payload = t.payload,
            table = t.table,
        );
        let now = self.clock.now();

        sqlx::query(&sql)
            .bind(key)
            .bind(payload)
            .bind(now.timestamp_millis())
            .execute(self.db.pool())
            .await
            .map_err(storage_err)?;

        Ok(CacheEntry {
            key: key.to_string(),
            payload: payload.to_string(),
            generated_at: from_millis(now.timestamp_millis())?,
        })
    }

    async fn get_transcript(&self, video_id: &str) -> StoreResult<Option<TranscriptEntry>> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT video_id, content, fetched_at FROM transcripts WHERE video_id = $1",
        )
        .bind(video_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(storage_err)?;

        row.map(|(video_id, content, fetched_at)| {
            Ok(TranscriptEntry {
                video_id,
                content,
                fetched_at: from_millis(fetched_at)?,
            })
        })
        .transpose()
    }

    async fn insert_transcript_if_absent(
        &self,
        video_id: &str,
        content: &str,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO transcripts (video_id, content, fetched_at) VALUES ($1, $2, $3)
             ON CONFLICT (video_id) DO NOTHING",
        )
        .bind(video_id)
        .bind(content)
        .bind(self.clock.now().timestamp_millis())
        .execute(self.db.pool())
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn try_acquire_lease(
        &self,
        kind: ResourceKind,
        key: &str,
        lease_ttl: Duration,
    ) -> StoreResult<bool> {
        let now = self.clock.now();
        let expired_before = (now - lease_ttl).timestamp_millis();

        // The conditional upsert is the compare-and-swap: it only writes when
        // there is no live running marker for this key.
        let result = sqlx::query(
            "INSERT INTO job_status (kind, resource_key, state, detail, updated_at)
             VALUES ($1, $2, 'running', NULL, $3)
             ON CONFLICT (kind, resource_key) DO UPDATE
             SET state = 'running', detail = NULL, updated_at = excluded.updated_at
             WHERE job_status.state <> 'running' OR job_status.updated_at < $4",
        )
        .bind(kind.as_str())
        .bind(key)
        .bind(now.timestamp_millis())
        .bind(expired_before)
        .execute(self.db.pool())
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_lease(&self, kind: ResourceKind, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM job_status WHERE kind = $1 AND resource_key = $2")
            .bind(kind.as_str())
            .bind(key)
            .execute(self.db.pool())
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn mark_failed(&self, kind: ResourceKind, key: &str, detail: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO job_status (kind, resource_key, state, detail, updated_at)
             VALUES ($1, $2, 'failed', $3, $4)
             ON CONFLICT (kind, resource_key) DO UPDATE
             SET state = 'failed', detail = excluded.detail, updated_at = excluded.updated_at",
        )
        .bind(kind.as_str())
        .bind(key)
        .bind(detail)
        .bind(self.clock.now().timestamp_millis())
        .execute(self.db.pool())
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn job_state(&self, kind: ResourceKind, key: &str) -> StoreResult<Option<JobState>> {
        let row: Option<(String, Option<String>, i64)> = sqlx::query_as(
            "SELECT state, detail, updated_at FROM job_status WHERE kind = $1 AND resource_key = $2",
        )
        .bind(kind.as_str())
        .bind(key)
        .fetch_optional(self.db.pool())
        .await
        .map_err(storage_err)?;

        let Some((state, detail, updated_at)) = row else {
            return Ok(None);
        };
        let at = from_millis(updated_at)?;

        match state.as_str() {
            STATE_RUNNING => Ok(Some(JobState::Running { started_at: at })),
            STATE_FAILED => Ok(Some(JobState::Failed {
                detail: detail.unwrap_or_default(),
                failed_at: at,
            })),
            other => Err(StoreError::Decode(format!("unknown job state: {other}"))),
        }
    }
}
