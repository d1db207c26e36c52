use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::modules::image_job::events::{JobCreated, IMAGE_JOB_QUEUE};
use crate::workers::pool::WorkerPool;
use anyhow::Result;
use futures_util::StreamExt;
use lapin::options::BasicAckOptions;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub fn decode_job_id(payload: &[u8]) -> Result<Uuid, serde_json::Error> {
    serde_json::from_slice::<JobCreated>(payload).map(|message| message.job_id)
}

/// Feeds job ids from the queue into the pool. Messages are acked once handed
/// off; a job that never finishes stays visible through its status.
pub async fn start_image_worker(queue: RabbitMqService, pool: WorkerPool) -> Result<()> {
    info!("🖼️ Starting image worker...");

    pool.recover_pending().await?;

    let mut consumer = queue.consume(IMAGE_JOB_QUEUE, "image_worker").await?;
    info!("🖼️ Image worker listening on '{}'", IMAGE_JOB_QUEUE);

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("Failed to receive message: {}", e);
                continue;
            }
        };

        match decode_job_id(&delivery.data) {
            Ok(job_id) => {
                info!("📦 Received job {}", job_id);
                if !pool.submit(job_id).await {
                    debug!("Job {} not queued", job_id);
                }
            }
            Err(e) => error!("❌ Dropping undecodable job message: {}", e),
        }

        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!("Failed to ack message: {}", e);
        }
    }

    warn!("Image worker consumer stream ended");
    Ok(())
}
