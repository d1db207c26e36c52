use anyhow::Context;
use axum::http::StatusCode;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::dto::{CreateJobResponse, JobStatusResponse};
use super::events::{JobCreated, IMAGE_JOB_QUEUE};
use super::model::{ImageJob, JobStatus};
use super::params::TransformParameters;
use super::repository::{JobStore, PgJobStore};
use crate::common::response::ApiError;
use crate::common::upload::ImageUpload;
use crate::infrastructure::storage::RAW_UPLOADS_FOLDER;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum JobRequestError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl JobRequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            JobRequestError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
            JobRequestError::NotFound(_) => StatusCode::NOT_FOUND,
            JobRequestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JobRequestError> for ApiError {
    fn from(e: JobRequestError) -> Self {
        ApiError(e.to_string(), e.status_code())
    }
}

/// Decodes and validates the `params` form field. A missing or blank field
/// means a plain conversion with defaults.
pub fn parse_parameters(raw: Option<&str>) -> Result<TransformParameters, JobRequestError> {
    let params = match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => TransformParameters::from_json(raw)
            .map_err(|e| JobRequestError::InvalidParameters(e.to_string()))?,
        None => TransformParameters::default(),
    };

    params
        .validate()
        .map_err(|e| JobRequestError::InvalidParameters(e.to_string()))?;

    Ok(params)
}

pub struct ImageJobService;

impl ImageJobService {
    /// Stores the raw image, records a `Pending` job and, once the record is
    /// committed, announces it on the job queue.
    pub async fn create_and_submit(
        state: AppState,
        upload: ImageUpload,
        params: TransformParameters,
    ) -> Result<CreateJobResponse, JobRequestError> {
        let parameters = params
            .to_json()
            .context("Failed to serialize job parameters")?;

        let raw_key = state
            .storage
            .put_bytes(
                RAW_UPLOADS_FOLDER,
                &upload.file_name,
                &upload.extension(),
                &upload.content_type,
                upload.data,
            )
            .await
            .context("Failed to store raw upload")?;

        let job = ImageJob::new(raw_key, parameters);

        let mut tx = state.db.begin().await.context("Failed to open transaction")?;
        PgJobStore::insert(&mut tx, &job)
            .await
            .context("Failed to record job")?;
        tx.commit().await.context("Failed to commit job")?;
        info!("📥 Job {} recorded for {}", job.id, job.raw_key);

        // Publish only after commit so workers never see an unknown id.
        if let Err(e) = state
            .queue
            .publish_json(IMAGE_JOB_QUEUE, &JobCreated { job_id: job.id })
            .await
        {
            warn!(
                "Failed to publish job {}: {}. It stays PENDING until the next recovery pass.",
                job.id, e
            );
        }

        Ok(CreateJobResponse {
            job_id: job.id,
            status: job.status,
        })
    }

    pub async fn get_status(
        state: AppState,
        job_id: Uuid,
    ) -> Result<JobStatusResponse, JobRequestError> {
        let job = state
            .jobs
            .get(job_id)
            .await
            .context("Failed to load job")?
            .ok_or(JobRequestError::NotFound(job_id))?;

        let download_url = match (job.status, job.processed_key.as_deref()) {
            (JobStatus::Completed, Some(key)) => Some(
                state
                    .storage
                    .presigned_url(key, state.config.presign_ttl)
                    .await
                    .context("Failed to create download link")?,
            ),
            _ => None,
        };

        Ok(JobStatusResponse::from_job(&job, download_url))
    }
}
