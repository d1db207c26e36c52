use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::command::RasterBackend;
use super::error::ProcessingError;
use super::executor::CommandRunner;
use super::scratch::{remove_quietly, ScratchDir};
use super::search::QualitySearch;
use crate::infrastructure::storage::{content_type_for, ObjectStorage, PROCESSED_FILES_FOLDER};
use crate::modules::image_job::model::{ImageJob, JobStatus};
use crate::modules::image_job::params::{CompressionStrategy, TransformParameters};
use crate::modules::image_job::repository::JobStore;

/// Drives one job from `Pending` to a terminal status.
///
/// Not safe to run twice on the same job id at once; the worker pool
/// guarantees a single owner per id.
#[derive(Clone)]
pub struct JobProcessor {
    jobs: Arc<dyn JobStore>,
    storage: Arc<dyn ObjectStorage>,
    runner: Arc<dyn CommandRunner>,
    backend: Arc<dyn RasterBackend>,
    scratch: ScratchDir,
}

impl JobProcessor {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        storage: Arc<dyn ObjectStorage>,
        runner: Arc<dyn CommandRunner>,
        backend: Arc<dyn RasterBackend>,
        scratch: ScratchDir,
    ) -> Self {
        Self {
            jobs,
            storage,
            runner,
            backend,
            scratch,
        }
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    /// Runs one full attempt and returns the job's resulting status.
    ///
    /// Only a missing job or a failing job store surface as `Err`; every
    /// other failure is recorded on the job as `Failed`.
    pub async fn process(&self, job_id: Uuid) -> Result<JobStatus, ProcessingError> {
        let mut job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(ProcessingError::NotFound(job_id))?;

        if job.status != JobStatus::Pending {
            warn!("Job {} is already {}, ignoring trigger", job_id, job.status);
            return Ok(job.status);
        }

        info!("🖼️ Processing job {} with {:?}", job_id, self.backend.kind());
        job.mark_processing()?;
        self.jobs.save(&job).await?;

        let mut temp_files = Vec::new();
        match self.transform(&job, &mut temp_files).await {
            Ok(processed_key) => {
                job.complete(processed_key)?;
                info!("✅ Job {} completed", job_id);
            }
            Err(e) => {
                error!("❌ Job {} failed: {}", job_id, e);
                job.fail(e.to_string())?;
            }
        }

        let saved = self.jobs.save(&job).await;

        for path in &temp_files {
            remove_quietly(path).await;
        }

        saved?;
        Ok(job.status)
    }

    /// Download, transform and upload. Every local file created is pushed
    /// onto `temp_files` once, so an aliased raw file is removed only once.
    async fn transform(
        &self,
        job: &ImageJob,
        temp_files: &mut Vec<PathBuf>,
    ) -> Result<String, ProcessingError> {
        self.scratch.ensure().await?;

        let raw = self.storage.download(&job.raw_key, self.scratch.root()).await?;
        temp_files.push(raw.clone());

        let params = TransformParameters::from_json(&job.parameters)?;
        params
            .validate()
            .map_err(|e| ProcessingError::InvalidParameters(e.to_string()))?;
        let format = params.output_format();

        let mut output = None;
        if let Some(window) = params.size_window() {
            let raw_size = tokio::fs::metadata(&raw).await?.len();
            if window.contains(raw_size) {
                info!(
                    "Raw file for job {} is {} bytes, already within {}. Skipping processing.",
                    job.id, raw_size, window
                );
                output = Some(raw.clone());
            }
        }

        let output = match output {
            Some(path) => path,
            None => match params.compression_strategy() {
                CompressionStrategy::TargetSize(window) => {
                    let probe = QualitySearch::new(
                        self.backend.as_ref(),
                        self.runner.as_ref(),
                        &self.scratch,
                    )
                    .search(&params, &raw, window)
                    .await?;
                    info!(
                        "Job {} settled on quality {} ({} bytes)",
                        job.id, probe.quality, probe.size
                    );
                    temp_files.push(probe.path.clone());
                    probe.path
                }
                CompressionStrategy::Fixed(_) | CompressionStrategy::ToolDefault => {
                    let path = self.scratch.path_for("out", &format);
                    temp_files.push(path.clone());
                    let argv = self.backend.build(&params, &raw, &path, None);
                    self.runner.run(&argv).await?;
                    path
                }
            },
        };

        let key = self
            .storage
            .upload(PROCESSED_FILES_FOLDER, &output, &format, &content_type_for(&format))
            .await?;
        info!("⬆️ Uploaded result for job {} to {}", job.id, key);

        Ok(key)
    }
}
