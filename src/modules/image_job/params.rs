use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

pub const DEFAULT_OUTPUT_FORMAT: &str = "jpg";

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// The declarative transform request stored with every job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransformParameters {
    /// Target encoding, e.g. `jpg` or `png`. Defaults to `jpg`.
    pub output_format: Option<String>,
    #[validate(range(min = 1))]
    pub dpi: Option<u32>,
    #[validate(nested)]
    pub resize: Option<ResizeParams>,
    #[validate(nested)]
    pub crop: Option<CropParams>,
    #[validate(nested)]
    pub compression: Option<CompressionParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResizeParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub unit: Option<String>,
    /// Accepted but not honored: explicit dimensions always win.
    #[serde(default)]
    pub lock_aspect_ratio: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CropParams {
    pub x: u32,
    pub y: u32,
    #[validate(range(min = 1))]
    pub width: u32,
    #[validate(range(min = 1))]
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_window"))]
pub struct CompressionParams {
    #[validate(range(max = 100))]
    pub quality: Option<u8>,
    #[validate(range(min = 0.0))]
    pub min_size: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_size: Option<f64>,
    /// `KiB` (default) or `MiB`, matched case-insensitively.
    pub unit: Option<String>,
}

fn validate_window(compression: &CompressionParams) -> Result<(), ValidationError> {
    if let (Some(min), Some(max)) = (compression.min_size, compression.max_size) {
        if min > max {
            return Err(ValidationError::new("min_size_exceeds_max_size")
                .with_message("minSize must not exceed maxSize".into()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    KiB,
    MiB,
}

impl SizeUnit {
    /// Unknown or missing units fall back to KiB.
    pub fn parse(unit: Option<&str>) -> Self {
        match unit {
            Some(u) if u.trim().eq_ignore_ascii_case("mib") => SizeUnit::MiB,
            _ => SizeUnit::KiB,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            SizeUnit::KiB => KIB,
            SizeUnit::MiB => MIB,
        }
    }

    pub fn to_bytes(self, amount: f64) -> u64 {
        (amount * self.multiplier()) as u64
    }
}

/// Inclusive target byte-size range for an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeWindow {
    pub min_bytes: u64,
    pub max_bytes: u64,
}

impl SizeWindow {
    pub fn new(min_bytes: u64, max_bytes: u64) -> Self {
        Self {
            min_bytes,
            max_bytes,
        }
    }

    pub fn contains(&self, size: u64) -> bool {
        size >= self.min_bytes && size <= self.max_bytes
    }
}

impl std::fmt::Display for SizeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}] bytes", self.min_bytes, self.max_bytes)
    }
}

/// The single compression behaviour in effect for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionStrategy {
    /// Encoder quality percent, 0-100.
    Fixed(u8),
    TargetSize(SizeWindow),
    ToolDefault,
}

impl CompressionParams {
    pub fn unit(&self) -> SizeUnit {
        SizeUnit::parse(self.unit.as_deref())
    }

    /// A window is configured only when both bounds are present.
    pub fn size_window(&self) -> Option<SizeWindow> {
        let unit = self.unit();
        match (self.min_size, self.max_size) {
            (Some(min), Some(max)) => Some(SizeWindow::new(unit.to_bytes(min), unit.to_bytes(max))),
            _ => None,
        }
    }
}

impl ResizeParams {
    /// Target dimensions, when both are positive.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

impl TransformParameters {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Lower-cased output extension without a leading dot.
    pub fn output_format(&self) -> String {
        self.output_format
            .as_deref()
            .map(|f| f.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.to_string())
    }

    pub fn size_window(&self) -> Option<SizeWindow> {
        self.compression.as_ref().and_then(CompressionParams::size_window)
    }

    pub fn dpi(&self) -> Option<u32> {
        self.dpi.filter(|d| *d > 0)
    }

    /// Fixed quality wins over a size window, which wins over the tool default.
    pub fn compression_strategy(&self) -> CompressionStrategy {
        let Some(compression) = &self.compression else {
            return CompressionStrategy::ToolDefault;
        };
        if let Some(quality) = compression.quality {
            return CompressionStrategy::Fixed(quality);
        }
        match compression.size_window() {
            Some(window) => CompressionStrategy::TargetSize(window),
            None => CompressionStrategy::ToolDefault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_camel_case_request() {
        let raw = r#"{
            "outputFormat": "PNG",
            "dpi": 300,
            "resize": {"width": 800, "height": 600, "lockAspectRatio": true},
            "crop": {"x": 10, "y": 20, "width": 100, "height": 50},
            "compression": {"minSize": 50, "maxSize": 100, "unit": "KiB"}
        }"#;
        let params = TransformParameters::from_json(raw).unwrap();

        assert_eq!(params.output_format(), "png");
        assert_eq!(params.dpi(), Some(300));
        assert_eq!(params.resize.as_ref().unwrap().dimensions(), Some((800, 600)));
        assert!(params.resize.as_ref().unwrap().lock_aspect_ratio);
        assert_eq!(params.crop.as_ref().unwrap().y, 20);
        assert_eq!(params.size_window(), Some(SizeWindow::new(51_200, 102_400)));
    }

    #[test]
    fn test_output_format_defaults_to_jpg() {
        let params = TransformParameters::from_json("{}").unwrap();
        assert_eq!(params.output_format(), "jpg");

        let blank = TransformParameters {
            output_format: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.output_format(), "jpg");

        let dotted = TransformParameters {
            output_format: Some(".WebP".to_string()),
            ..Default::default()
        };
        assert_eq!(dotted.output_format(), "webp");
    }

    #[test]
    fn test_size_unit_parsing() {
        assert_eq!(SizeUnit::parse(None), SizeUnit::KiB);
        assert_eq!(SizeUnit::parse(Some("MiB")), SizeUnit::MiB);
        assert_eq!(SizeUnit::parse(Some("mib")), SizeUnit::MiB);
        assert_eq!(SizeUnit::parse(Some("KiB")), SizeUnit::KiB);
        assert_eq!(SizeUnit::parse(Some("GB")), SizeUnit::KiB);
        assert_eq!(SizeUnit::MiB.to_bytes(1.5), 1_572_864);
    }

    #[test]
    fn test_partial_window_is_not_a_window() {
        let compression = CompressionParams {
            min_size: Some(10.0),
            ..Default::default()
        };
        assert_eq!(compression.size_window(), None);
    }

    #[test]
    fn test_strategy_priority() {
        let mut params = TransformParameters::default();
        assert_eq!(params.compression_strategy(), CompressionStrategy::ToolDefault);

        params.compression = Some(CompressionParams {
            min_size: Some(1.0),
            max_size: Some(2.0),
            unit: Some("MiB".to_string()),
            ..Default::default()
        });
        assert_eq!(
            params.compression_strategy(),
            CompressionStrategy::TargetSize(SizeWindow::new(1_048_576, 2_097_152))
        );

        params.compression.as_mut().unwrap().quality = Some(70);
        assert_eq!(params.compression_strategy(), CompressionStrategy::Fixed(70));
    }

    #[test]
    fn test_resize_needs_both_positive_dimensions() {
        let resize = ResizeParams {
            width: Some(100),
            height: Some(0),
            ..Default::default()
        };
        assert_eq!(resize.dimensions(), None);

        let resize = ResizeParams {
            width: Some(100),
            height: None,
            ..Default::default()
        };
        assert_eq!(resize.dimensions(), None);
    }

    #[test]
    fn test_validation_rejects_inverted_window() {
        let params = TransformParameters {
            compression: Some(CompressionParams {
                min_size: Some(200.0),
                max_size: Some(100.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let params = TransformParameters {
            dpi: Some(0),
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = TransformParameters {
            compression: Some(CompressionParams {
                quality: Some(101),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = TransformParameters {
            crop: Some(CropParams {
                x: 0,
                y: 0,
                width: 0,
                height: 10,
            }),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validation_accepts_typical_request() {
        let params = TransformParameters {
            output_format: Some("jpg".to_string()),
            dpi: Some(72),
            compression: Some(CompressionParams {
                quality: Some(85),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }
}
