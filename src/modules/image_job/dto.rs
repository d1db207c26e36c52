use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use super::model::{ImageJob, JobStatus};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    /// Presigned GET link, present only once the job is `COMPLETED`.
    pub download_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl JobStatusResponse {
    pub fn from_job(job: &ImageJob, download_url: Option<String>) -> Self {
        let download_url = match job.status {
            JobStatus::Completed => download_url,
            _ => None,
        };
        Self {
            job_id: job.id,
            status: job.status,
            download_url,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}
