//! Runs the external rasterizing tool.
//!
//! Output from stdout and stderr is drained concurrently with the wait and
//! logged line by line, so a chatty tool can never block on a full pipe.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::ToolError;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Executes a full command line (`argv[0]` is the program).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[String]) -> Result<(), ToolError>;
}

#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    timeout: Duration,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

impl ProcessExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn drain_lines<R>(program: String, stream: Option<R>, label: &'static str) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(stream) = stream else {
            return 0;
        };
        let mut lines = BufReader::new(stream).lines();
        let mut count = 0;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    count += 1;
                    debug!("{} {}: {}", program, label, line);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped reading {} {}: {}", program, label, e);
                    break;
                }
            }
        }
        count
    })
}

#[async_trait]
impl CommandRunner for ProcessExecutor {
    async fn run(&self, argv: &[String]) -> Result<(), ToolError> {
        let (program, args) = argv.split_first().ok_or(ToolError::EmptyCommand)?;
        info!("Running: {}", argv.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut stdout_task = drain_lines(program.clone(), child.stdout.take(), "stdout");
        let mut stderr_task = drain_lines(program.clone(), child.stderr.take(), "stderr");

        let started = Instant::now();
        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(ToolError::Io {
                    program: program.clone(),
                    source,
                });
            }
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out {}: {}", program, e);
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(ToolError::Timeout {
                    program: program.clone(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        // A backgrounded grandchild can keep the pipes open after exit, so the
        // drains share what is left of the budget.
        let remaining = self.timeout.saturating_sub(started.elapsed());
        let drained = tokio::time::timeout(remaining, async {
            (&mut stdout_task).await.unwrap_or(0) + (&mut stderr_task).await.unwrap_or(0)
        })
        .await;
        let lines = match drained {
            Ok(lines) => lines,
            Err(_elapsed) => {
                warn!("{} exited but its output pipes stayed open", program);
                stdout_task.abort();
                stderr_task.abort();
                return Err(ToolError::Timeout {
                    program: program.clone(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };
        debug!("{} exited with {} after {} output lines", program, status, lines);

        if !status.success() {
            return Err(ToolError::Exit {
                program: program.clone(),
                code: status.code(),
            });
        }

        Ok(())
    }
}
