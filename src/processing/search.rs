//! Bisection over the encoder quality domain to land an output inside a
//! byte-size window.
//!
//! Both extremes are probed first so unreachable targets fail fast. Every
//! probe file that is not handed back to the caller is deleted before
//! returning, on success and failure alike.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::command::RasterBackend;
use super::error::{CompressionError, ProcessingError};
use super::executor::CommandRunner;
use super::scratch::{remove_quietly, ScratchDir};
use crate::modules::image_job::params::{SizeWindow, TransformParameters};

/// One encoded candidate on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub quality: u32,
    pub path: PathBuf,
    pub size: u64,
}

pub struct QualitySearch<'a> {
    backend: &'a dyn RasterBackend,
    runner: &'a dyn CommandRunner,
    scratch: &'a ScratchDir,
    max_attempts: u32,
}

impl<'a> QualitySearch<'a> {
    pub fn new(
        backend: &'a dyn RasterBackend,
        runner: &'a dyn CommandRunner,
        scratch: &'a ScratchDir,
    ) -> Self {
        Self {
            backend,
            runner,
            scratch,
            max_attempts: backend.max_search_attempts(),
        }
    }

    /// Caps the number of bisection probes (the two extremes are not counted).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub async fn search(
        &self,
        params: &TransformParameters,
        input: &Path,
        window: SizeWindow,
    ) -> Result<Probe, ProcessingError> {
        let domain = self.backend.quality_domain();
        let extension = params.output_format();

        let best = self.probe(params, input, domain.best(), &extension).await?;
        let worst = match self.probe(params, input, domain.worst(), &extension).await {
            Ok(probe) => probe,
            Err(e) => {
                remove_quietly(&best.path).await;
                return Err(e);
            }
        };
        info!(
            "Quality extremes for {}: best q={} -> {} bytes, worst q={} -> {} bytes, target {}",
            input.display(),
            best.quality,
            best.size,
            worst.quality,
            worst.size,
            window
        );

        let (best_size, worst_size) = (best.size, worst.size);

        if best_size < window.min_bytes {
            remove_quietly(&best.path).await;
            remove_quietly(&worst.path).await;
            return Err(CompressionError::TooSimple {
                best_size,
                worst_size,
                window,
            }
            .into());
        }

        if worst_size > window.max_bytes {
            remove_quietly(&best.path).await;
            remove_quietly(&worst.path).await;
            return Err(CompressionError::TooComplex {
                best_size,
                worst_size,
                window,
            }
            .into());
        }

        if window.contains(best_size) {
            remove_quietly(&worst.path).await;
            return Ok(best);
        }
        remove_quietly(&best.path).await;

        // A worst-quality hit is the fallback while bisection looks for a
        // higher quality that still fits.
        let mut candidate: Option<Probe> = if window.contains(worst_size) {
            Some(worst)
        } else {
            remove_quietly(&worst.path).await;
            None
        };

        // Levels strictly between the two extremes; level 0 is the smallest output.
        let mut lo: u32 = 1;
        let mut hi: u32 = domain.top_level().saturating_sub(1);
        let mut attempts = 0;

        while lo <= hi && attempts < self.max_attempts {
            let mid = lo + (hi - lo) / 2;
            attempts += 1;

            let probe = match self
                .probe(params, input, domain.quality_at(mid), &extension)
                .await
            {
                Ok(probe) => probe,
                Err(e) => {
                    if let Some(previous) = candidate.take() {
                        remove_quietly(&previous.path).await;
                    }
                    return Err(e);
                }
            };
            info!(
                "Probe {}/{}: quality {} -> {} bytes, target {}",
                attempts, self.max_attempts, probe.quality, probe.size, window
            );

            if window.contains(probe.size) {
                if let Some(previous) = candidate.take() {
                    remove_quietly(&previous.path).await;
                }
                return Ok(probe);
            }

            if probe.size < window.min_bytes {
                lo = mid + 1;
                let keeps_hit = candidate.as_ref().is_some_and(|c| window.contains(c.size));
                if keeps_hit {
                    remove_quietly(&probe.path).await;
                } else if let Some(previous) = candidate.replace(probe) {
                    remove_quietly(&previous.path).await;
                }
            } else {
                hi = mid - 1;
                remove_quietly(&probe.path).await;
            }
        }

        match candidate {
            Some(probe) if window.contains(probe.size) => {
                info!(
                    "Settled on quality {} at {} bytes after {} probes",
                    probe.quality, probe.size, attempts
                );
                Ok(probe)
            }
            Some(probe) if probe.size <= window.max_bytes => {
                warn!(
                    "No exact hit for {} after {} probes, using quality {} at {} bytes",
                    window, attempts, probe.quality, probe.size
                );
                Ok(probe)
            }
            leftover => {
                if let Some(probe) = leftover {
                    remove_quietly(&probe.path).await;
                }
                Err(CompressionError::Exhausted {
                    best_size,
                    worst_size,
                    window,
                }
                .into())
            }
        }
    }

    async fn probe(
        &self,
        params: &TransformParameters,
        input: &Path,
        quality: u32,
        extension: &str,
    ) -> Result<Probe, ProcessingError> {
        let path = self.scratch.path_for("probe", extension);
        let argv = self.backend.build(params, input, &path, Some(quality));

        if let Err(e) = self.runner.run(&argv).await {
            remove_quietly(&path).await;
            return Err(e.into());
        }

        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                remove_quietly(&path).await;
                return Err(e.into());
            }
        };
        debug!("Encoded {} at quality {} ({} bytes)", path.display(), quality, size);

        Ok(Probe {
            quality,
            path,
            size,
        })
    }
}
