use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Pending -> Processing -> {Completed | Failed}; nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal job transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub raw_key: String,
    /// Set only once the job is `Completed`.
    pub processed_key: Option<String>,
    /// Serialized `TransformParameters`, immutable after creation.
    pub parameters: String,
    pub failure_reason: Option<String>,
    pub created_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}

impl ImageJob {
    pub fn new(raw_key: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            raw_key: raw_key.into(),
            processed_key: None,
            parameters: parameters.into(),
            failure_reason: None,
            created_at: OffsetDateTime::now_utc(),
            completed_at: None,
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_processing(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Processing)
    }

    pub fn complete(&mut self, processed_key: String) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Completed)?;
        self.processed_key = Some(processed_key);
        self.failure_reason = None;
        self.completed_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Failed)?;
        self.processed_key = None;
        self.failure_reason = Some(reason.into());
        self.completed_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }
}

// Row shape of the image_jobs table; status is stored as text.
#[derive(Debug, FromRow)]
pub struct ImageJobRow {
    pub id: Uuid,
    pub status: String,
    pub raw_key: String,
    pub processed_key: Option<String>,
    pub parameters: String,
    pub failure_reason: Option<String>,
    pub created_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}

impl TryFrom<ImageJobRow> for ImageJob {
    type Error = String;

    fn try_from(row: ImageJobRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            status: row.status.parse()?,
            raw_key: row.raw_key,
            processed_key: row.processed_key,
            parameters: row.parameters,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}
