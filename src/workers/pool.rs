use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_channel::{Receiver, Sender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::modules::image_job::model::JobStatus;
use crate::processing::JobProcessor;

/// Fixed set of tasks draining a shared job queue.
///
/// A job id is held in the in-flight set from submission until its worker
/// finishes, so two workers never process the same job at once.
#[derive(Clone)]
pub struct WorkerPool {
    sender: Sender<Uuid>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    processor: JobProcessor,
}

impl WorkerPool {
    pub fn start(processor: JobProcessor, concurrency: usize) -> (Self, Vec<JoinHandle<()>>) {
        let concurrency = concurrency.max(1);
        let (sender, receiver) = async_channel::bounded(concurrency * 16);
        let in_flight = Arc::new(Mutex::new(HashSet::new()));

        let handles = (0..concurrency)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    receiver.clone(),
                    processor.clone(),
                    in_flight.clone(),
                ))
            })
            .collect();

        info!("🧵 Started {} image workers", concurrency);

        (
            Self {
                sender,
                in_flight,
                processor,
            },
            handles,
        )
    }

    /// Queues a job unless it is already queued or running. Returns whether it was queued.
    pub async fn submit(&self, job_id: Uuid) -> bool {
        if !self.in_flight.lock().await.insert(job_id) {
            debug!("Job {} is already in flight", job_id);
            return false;
        }

        if self.sender.send(job_id).await.is_err() {
            error!("Worker pool is closed, dropping job {}", job_id);
            self.in_flight.lock().await.remove(&job_id);
            return false;
        }

        true
    }

    /// Resubmits every job still `Pending`, e.g. ones whose publish was lost.
    pub async fn recover_pending(&self) -> Result<usize> {
        let pending = self.processor.jobs().list_by_status(JobStatus::Pending).await?;
        let mut submitted = 0;
        for job in pending {
            if self.submit(job.id).await {
                submitted += 1;
            }
        }
        if submitted > 0 {
            info!("♻️ Resubmitted {} pending jobs", submitted);
        }
        Ok(submitted)
    }

    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Stops accepting jobs; workers exit once the queue drains.
    pub fn close(&self) {
        self.sender.close();
    }
}

async fn run_worker(
    worker: usize,
    receiver: Receiver<Uuid>,
    processor: JobProcessor,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
) {
    while let Ok(job_id) = receiver.recv().await {
        debug!("Worker {} picked up job {}", worker, job_id);
        match processor.process(job_id).await {
            Ok(status) => debug!("Worker {} finished job {} as {}", worker, job_id, status),
            Err(e) => error!("Worker {} could not process job {}: {}", worker, job_id, e),
        }
        in_flight.lock().await.remove(&job_id);
    }
    debug!("Worker {} stopped", worker);
}
