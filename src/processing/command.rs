//! Maps transform parameters onto a command line for the rasterizing tool.
//!
//! Flag order is fixed: input, density, crop, resize, quality, output. Two
//! invocations for the same parameters differ only in the quality flag.

use std::path::Path;
use std::sync::Arc;

use crate::modules::image_job::params::{CompressionStrategy, TransformParameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    GraphicsMagick,
    Ffmpeg,
}

impl ToolKind {
    pub fn default_binary(&self) -> &'static str {
        match self {
            ToolKind::GraphicsMagick => "gm",
            ToolKind::Ffmpeg => "ffmpeg",
        }
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gm" | "graphicsmagick" => Ok(ToolKind::GraphicsMagick),
            "ffmpeg" => Ok(ToolKind::Ffmpeg),
            other => Err(format!("unsupported image tool '{other}' (expected gm or ffmpeg)")),
        }
    }
}

/// How output size moves as the tool's numeric quality value grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDirection {
    Ascending,
    Descending,
}

/// Closed integer range of native quality values.
///
/// Search code works in "levels": level 0 yields the smallest file and
/// `top_level()` the largest, whatever the tool's numeric convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityDomain {
    pub min: u32,
    pub max: u32,
    pub direction: SizeDirection,
}

impl QualityDomain {
    pub fn top_level(&self) -> u32 {
        self.max - self.min
    }

    pub fn quality_at(&self, level: u32) -> u32 {
        let level = level.min(self.top_level());
        match self.direction {
            SizeDirection::Ascending => self.min + level,
            SizeDirection::Descending => self.max - level,
        }
    }

    /// Native value producing the largest file.
    pub fn best(&self) -> u32 {
        self.quality_at(self.top_level())
    }

    /// Native value producing the smallest file.
    pub fn worst(&self) -> u32 {
        self.quality_at(0)
    }
}

pub trait RasterBackend: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn quality_domain(&self) -> QualityDomain;

    /// Upper bound on bisection probes.
    fn max_search_attempts(&self) -> u32 {
        8
    }

    /// Maps a 0-100 quality percent onto the native domain.
    fn native_quality(&self, percent: u8) -> u32;

    /// Full argument vector, program first, output path last.
    fn build(
        &self,
        params: &TransformParameters,
        input: &Path,
        output: &Path,
        quality_override: Option<u32>,
    ) -> Vec<String>;
}

pub fn backend_for(kind: ToolKind, binary: Option<String>) -> Arc<dyn RasterBackend> {
    let binary = binary.unwrap_or_else(|| kind.default_binary().to_string());
    match kind {
        ToolKind::GraphicsMagick => Arc::new(GraphicsMagick::new(binary)),
        ToolKind::Ffmpeg => Arc::new(Ffmpeg::new(binary)),
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// --- GRAPHICSMAGICK ---

#[derive(Debug, Clone)]
pub struct GraphicsMagick {
    binary: String,
}

impl GraphicsMagick {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for GraphicsMagick {
    fn default() -> Self {
        Self::new(ToolKind::GraphicsMagick.default_binary())
    }
}

impl RasterBackend for GraphicsMagick {
    fn kind(&self) -> ToolKind {
        ToolKind::GraphicsMagick
    }

    fn quality_domain(&self) -> QualityDomain {
        QualityDomain {
            min: 0,
            max: 100,
            direction: SizeDirection::Ascending,
        }
    }

    fn native_quality(&self, percent: u8) -> u32 {
        u32::from(percent.min(100))
    }

    fn build(
        &self,
        params: &TransformParameters,
        input: &Path,
        output: &Path,
        quality_override: Option<u32>,
    ) -> Vec<String> {
        let mut argv = vec![self.binary.clone(), "convert".to_string(), path_arg(input)];

        if let Some(dpi) = params.dpi() {
            argv.push("-density".to_string());
            argv.push(format!("{dpi}x{dpi}"));
        }

        if let Some(crop) = &params.crop {
            argv.push("-crop".to_string());
            argv.push(format!("{}x{}+{}+{}", crop.width, crop.height, crop.x, crop.y));
        }

        if let Some((width, height)) = params.resize.as_ref().and_then(|r| r.dimensions()) {
            // '!' forces the exact geometry.
            argv.push("-resize".to_string());
            argv.push(format!("{width}x{height}!"));
        }

        match (quality_override, params.compression_strategy()) {
            (Some(quality), _) => {
                argv.push("-quality".to_string());
                argv.push(quality.to_string());
            }
            (None, CompressionStrategy::Fixed(percent)) => {
                argv.push("-quality".to_string());
                argv.push(self.native_quality(percent).to_string());
            }
            (None, CompressionStrategy::ToolDefault) => {
                argv.extend(
                    ["-quality", "100", "-sampling-factor", "1x1,1x1,1x1"]
                        .iter()
                        .map(|s| s.to_string()),
                );
            }
            (None, CompressionStrategy::TargetSize(_)) => {}
        }

        argv.push(path_arg(output));
        argv
    }
}

// --- FFMPEG ---

/// ffmpeg still-image backend. It has no density flag, so `dpi` is not applied.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: String,
}

impl Ffmpeg {
    const BEST_QSCALE: u32 = 2;
    const WORST_QSCALE: u32 = 31;

    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new(ToolKind::Ffmpeg.default_binary())
    }
}

impl RasterBackend for Ffmpeg {
    fn kind(&self) -> ToolKind {
        ToolKind::Ffmpeg
    }

    fn quality_domain(&self) -> QualityDomain {
        QualityDomain {
            min: Self::BEST_QSCALE,
            max: Self::WORST_QSCALE,
            direction: SizeDirection::Descending,
        }
    }

    fn max_search_attempts(&self) -> u32 {
        10
    }

    fn native_quality(&self, percent: u8) -> u32 {
        let span = Self::WORST_QSCALE - Self::BEST_QSCALE;
        let percent = u32::from(percent.min(100));
        Self::WORST_QSCALE - (percent * span + 50) / 100
    }

    fn build(
        &self,
        params: &TransformParameters,
        input: &Path,
        output: &Path,
        quality_override: Option<u32>,
    ) -> Vec<String> {
        let mut argv: Vec<String> = [self.binary.as_str(), "-y", "-hide_banner", "-loglevel", "error", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        argv.push(path_arg(input));

        let mut filters = Vec::new();
        if let Some(crop) = &params.crop {
            filters.push(format!("crop={}:{}:{}:{}", crop.width, crop.height, crop.x, crop.y));
        }
        if let Some((width, height)) = params.resize.as_ref().and_then(|r| r.dimensions()) {
            filters.push(format!("scale={width}:{height}"));
        }
        if !filters.is_empty() {
            argv.push("-vf".to_string());
            argv.push(filters.join(","));
        }

        argv.push("-frames:v".to_string());
        argv.push("1".to_string());

        let quality = match (quality_override, params.compression_strategy()) {
            (Some(q), _) => Some(q),
            (None, CompressionStrategy::Fixed(percent)) => Some(self.native_quality(percent)),
            (None, CompressionStrategy::ToolDefault) => Some(Self::BEST_QSCALE),
            (None, CompressionStrategy::TargetSize(_)) => None,
        };
        if let Some(q) = quality {
            argv.push("-q:v".to_string());
            argv.push(q.to_string());
        }

        argv.push(path_arg(output));
        argv
    }
}
