pub mod command;
pub mod error;
pub mod executor;
pub mod processor;
pub mod scratch;
pub mod search;

pub use command::{backend_for, RasterBackend, ToolKind};
pub use error::{CompressionError, ProcessingError, ToolError};
pub use executor::{CommandRunner, ProcessExecutor};
pub use processor::JobProcessor;
pub use scratch::ScratchDir;
