#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use image_forge::infrastructure::storage::memory::MemoryStorage;
use image_forge::infrastructure::storage::RAW_UPLOADS_FOLDER;
use image_forge::modules::image_job::model::{ImageJob, JobStatus};
use image_forge::modules::image_job::repository::{JobStore, MemoryJobStore};
use image_forge::processing::command::GraphicsMagick;
use image_forge::processing::{CommandRunner, JobProcessor, ScratchDir, ToolError};

pub const KIB: u64 = 1024;

type SizeFn = Box<dyn Fn(Option<u32>) -> u64 + Send + Sync>;

/// Stands in for the rasterizing tool: writes an output whose size depends
/// on the `-quality` argument and records every command line.
pub struct FakeTool {
    size_of: SizeFn,
    calls: Mutex<Vec<Vec<String>>>,
    fail: AtomicBool,
    delay: Duration,
}

impl FakeTool {
    pub fn sized(size_of: impl Fn(Option<u32>) -> u64 + Send + Sync + 'static) -> Self {
        Self {
            size_of: Box::new(size_of),
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            delay: Duration::ZERO,
        }
    }

    pub fn fixed(size: u64) -> Self {
        Self::sized(move |_| size)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn quality_of(argv: &[String]) -> Option<u32> {
    argv.iter()
        .position(|a| a == "-quality")
        .and_then(|i| argv.get(i + 1))
        .and_then(|q| q.parse().ok())
}

#[async_trait]
impl CommandRunner for FakeTool {
    async fn run(&self, argv: &[String]) -> Result<(), ToolError> {
        self.calls.lock().unwrap().push(argv.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ToolError::Exit {
                program: argv[0].clone(),
                code: Some(1),
            });
        }
        let size = (self.size_of)(quality_of(argv)) as usize;
        let output = argv.last().expect("output path");
        tokio::fs::write(output, vec![7u8; size]).await.map_err(|source| ToolError::Io {
            program: argv[0].clone(),
            source,
        })
    }
}

pub struct Harness {
    pub store: MemoryJobStore,
    pub storage: MemoryStorage,
    pub tool: Arc<FakeTool>,
    pub processor: JobProcessor,
    scratch: tempfile::TempDir,
}

impl Harness {
    pub fn new(tool: FakeTool) -> Self {
        let store = MemoryJobStore::new();
        let storage = MemoryStorage::new();
        let tool = Arc::new(tool);
        let scratch = tempfile::tempdir().unwrap();
        let processor = JobProcessor::new(
            Arc::new(store.clone()),
            Arc::new(storage.clone()),
            tool.clone(),
            Arc::new(GraphicsMagick::default()),
            ScratchDir::new(scratch.path().join("work")),
        );
        Self {
            store,
            storage,
            tool,
            processor,
            scratch,
        }
    }

    /// Stores `raw` as an upload and records a pending job for it.
    pub async fn add_job(&self, raw: Vec<u8>, parameters: &str) -> Uuid {
        let key = format!("{}/{}-input.png", RAW_UPLOADS_FOLDER, Uuid::new_v4());
        self.storage.put(&key, raw, "image/png").await;
        let job = ImageJob::new(key, parameters);
        let id = job.id;
        self.store.insert(job).await;
        id
    }

    pub async fn job(&self, id: Uuid) -> ImageJob {
        self.store.get(id).await.unwrap().expect("job exists")
    }

    /// Files left behind in the processor's scratch directory.
    pub fn scratch_files(&self) -> usize {
        match std::fs::read_dir(self.scratch.path().join("work")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    pub fn scratch_root(&self) -> &Path {
        self.scratch.path()
    }
}

pub async fn wait_for_terminal(store: &MemoryJobStore, id: Uuid) -> ImageJob {
    for _ in 0..250 {
        if let Some(job) = store.get(id).await.unwrap() {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {id} did not reach a terminal status");
}

pub fn position(argv: &[String], flag: &str) -> usize {
    argv.iter()
        .position(|a| a == flag)
        .unwrap_or_else(|| panic!("{flag} missing from {argv:?}"))
}

pub fn assert_status(job: &ImageJob, status: JobStatus) {
    assert_eq!(job.status, status, "failure reason: {:?}", job.failure_reason);
}
