use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::DbPool;
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::image_job::repository::PgJobStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub storage: StorageService,
    pub queue: RabbitMqService,
    pub jobs: PgJobStore,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        storage: StorageService,
        queue: RabbitMqService,
    ) -> Self {
        let jobs = PgJobStore::new(db.clone());
        Self {
            config,
            db,
            storage,
            queue,
            jobs,
        }
    }
}
