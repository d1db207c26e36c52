use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable queue carrying newly committed job ids to the workers.
pub const IMAGE_JOB_QUEUE: &str = "image_jobs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: Uuid,
}
