use std::borrow::Borrow;

use thiserror::Error;
use uuid::Uuid;

use crate::infrastructure::storage::StorageError;
use crate::modules::image_job::model::InvalidTransition;
use crate::modules::image_job::params::SizeWindow;
use crate::modules::image_job::repository::StoreError;

fn kib(bytes: impl Borrow<u64>) -> f64 {
    *bytes.borrow() as f64 / 1024.0
}

fn exit_code(code: impl Borrow<Option<i32>>) -> String {
    match code.borrow() {
        Some(c) => c.to_string(),
        None => "none (killed by signal)".to_string(),
    }
}

/// Failures of a single external-tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("'{program}' failed with exit code {}", exit_code(.code))]
    Exit { program: String, code: Option<i32> },

    #[error("empty command line")]
    EmptyCommand,

    #[error("I/O error while waiting for '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// The target size window cannot be met for this image.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompressionError {
    #[error("Image is too simple to meet the minimum size. The highest quality version is only {:.2} KiB.", kib(.best_size))]
    TooSimple {
        best_size: u64,
        worst_size: u64,
        window: SizeWindow,
    },

    #[error("Image is too complex to meet the maximum size. Even the lowest quality version is {:.2} KiB.", kib(.worst_size))]
    TooComplex {
        best_size: u64,
        worst_size: u64,
        window: SizeWindow,
    },

    #[error("Could not meet target size {window}: best quality gives {:.2} KiB, worst quality gives {:.2} KiB.", kib(.best_size), kib(.worst_size))]
    Exhausted {
        best_size: u64,
        worst_size: u64,
        window: SizeWindow,
    },
}

impl CompressionError {
    pub fn best_size(&self) -> u64 {
        match self {
            CompressionError::TooSimple { best_size, .. }
            | CompressionError::TooComplex { best_size, .. }
            | CompressionError::Exhausted { best_size, .. } => *best_size,
        }
    }

    pub fn worst_size(&self) -> u64 {
        match self {
            CompressionError::TooSimple { worst_size, .. }
            | CompressionError::TooComplex { worst_size, .. }
            | CompressionError::Exhausted { worst_size, .. } => *worst_size,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("cannot decode job parameters: {0}")]
    ParameterDecode(#[from] serde_json::Error),

    #[error("invalid job parameters: {0}")]
    InvalidParameters(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("{0}")]
    CompressionUnreachable(#[from] CompressionError),

    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}
