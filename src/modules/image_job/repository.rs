use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::model::{ImageJob, ImageJobRow, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt job record {id}: {reason}")]
    CorruptRecord { id: Uuid, reason: String },
}

/// Read/write access to job records. One writer per job at a time.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ImageJob>, StoreError>;

    async fn save(&self, job: &ImageJob) -> Result<(), StoreError>;

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<ImageJob>, StoreError>;
}

const SELECT_COLUMNS: &str = "SELECT id, status, raw_key, processed_key, parameters, failure_reason, created_at, completed_at FROM image_jobs";

// parameters and created_at are fixed at insert time.
const UPSERT_JOB: &str = r#"
    INSERT INTO image_jobs (id, status, raw_key, processed_key, parameters, failure_reason, created_at, completed_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (id) DO UPDATE SET
        status = EXCLUDED.status,
        processed_key = EXCLUDED.processed_key,
        failure_reason = EXCLUDED.failure_reason,
        completed_at = EXCLUDED.completed_at
"#;

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new job inside the caller's transaction.
    pub async fn insert(tx: &mut Transaction<'_, Postgres>, job: &ImageJob) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO image_jobs (id, status, raw_key, processed_key, parameters, failure_reason, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(&job.raw_key)
        .bind(&job.processed_key)
        .bind(&job.parameters)
        .bind(&job.failure_reason)
        .bind(job.created_at)
        .bind(job.completed_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

fn into_job(row: ImageJobRow) -> Result<ImageJob, StoreError> {
    let id = row.id;
    ImageJob::try_from(row).map_err(|reason| StoreError::CorruptRecord { id, reason })
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn get(&self, id: Uuid) -> Result<Option<ImageJob>, StoreError> {
        let row = sqlx::query_as::<_, ImageJobRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(into_job).transpose()
    }

    async fn save(&self, job: &ImageJob) -> Result<(), StoreError> {
        sqlx::query(UPSERT_JOB)
            .bind(job.id)
            .bind(job.status.as_str())
            .bind(&job.raw_key)
            .bind(&job.processed_key)
            .bind(&job.parameters)
            .bind(&job.failure_reason)
            .bind(job.created_at)
            .bind(job.completed_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<ImageJob>, StoreError> {
        let rows = sqlx::query_as::<_, ImageJobRow>(&format!(
            "{SELECT_COLUMNS} WHERE status = $1 ORDER BY created_at ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_job).collect()
    }
}

/// Job store kept in process memory. Used by tests and local runs without Postgres.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<Mutex<HashMap<Uuid, ImageJob>>>,
    saves: Arc<Mutex<Vec<(Uuid, JobStatus)>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: ImageJob) {
        self.jobs.lock().await.insert(job.id, job);
    }

    /// Every status written through `save`, in order.
    pub async fn save_history(&self, id: Uuid) -> Vec<JobStatus> {
        self.saves
            .lock()
            .await
            .iter()
            .filter(|(job_id, _)| *job_id == id)
            .map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: Uuid) -> Result<Option<ImageJob>, StoreError> {
        Ok(self.jobs.lock().await.get(&id).cloned())
    }

    async fn save(&self, job: &ImageJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        let mut stored = job.clone();
        if let Some(existing) = jobs.get(&job.id) {
            stored.parameters = existing.parameters.clone();
            stored.created_at = existing.created_at;
        }
        jobs.insert(job.id, stored);
        self.saves.lock().await.push((job.id, job.status));
        Ok(())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<ImageJob>, StoreError> {
        let mut jobs: Vec<ImageJob> = self
            .jobs
            .lock()
            .await
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }
}
