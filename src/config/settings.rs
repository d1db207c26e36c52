use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::config::env::{self, EnvKey};
use crate::processing::command::ToolKind;
use crate::processing::executor::DEFAULT_TOOL_TIMEOUT;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub rabbitmq_url: String,
    pub minio_url: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub max_upload_bytes: usize,
    pub presign_ttl: Duration,
    pub processing: ProcessingConfig,
}

/// Settings for the job processor and its worker pool.
#[derive(Clone, Debug)]
pub struct ProcessingConfig {
    pub tool: ToolKind,
    /// Overrides the binary looked up on `PATH` for the chosen tool.
    pub tool_binary: Option<String>,
    pub tool_timeout: Duration,
    pub worker_concurrency: usize,
    pub work_dir: PathBuf,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: required(EnvKey::DatabaseUrl)?,
            rabbitmq_url: required(EnvKey::RabbitMqUrl)?,
            minio_url: required(EnvKey::MinioUrl)?,
            minio_bucket: required(EnvKey::MinioBucket)?,
            minio_access_key: required(EnvKey::MinioAccessKey)?,
            minio_secret_key: required(EnvKey::MinioSecretKey)?,
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, 25 * 1024 * 1024),
            presign_ttl: Duration::from_secs(env::get_parsed(EnvKey::PresignTtlSecs, 900)),
            processing: ProcessingConfig::from_env()?,
        })
    }
}

impl ProcessingConfig {
    pub fn from_env() -> Result<Self> {
        let tool = parse_tool(&env::get_or(EnvKey::ImageTool, "gm"))?;

        let work_dir = env::get_opt(EnvKey::WorkDir)
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        Ok(Self {
            tool,
            tool_binary: env::get_opt(EnvKey::ImageToolBinary),
            tool_timeout: Duration::from_secs(
                env::get_parsed(EnvKey::ToolTimeoutSecs, DEFAULT_TOOL_TIMEOUT.as_secs()),
            ),
            worker_concurrency: env::get_parsed(EnvKey::WorkerConcurrency, 4usize).max(1),
            work_dir,
        })
    }
}

fn parse_tool(raw: &str) -> Result<ToolKind> {
    raw.parse::<ToolKind>()
        .map_err(|e| anyhow!("invalid IMAGE_TOOL: {e}"))
}

fn required(key: EnvKey) -> Result<String> {
    let name = key.as_str();
    env::get(key).with_context(|| format!("missing required environment variable {name}"))
}
