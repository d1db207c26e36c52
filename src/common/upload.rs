use anyhow::{anyhow, Result};
use axum::{body::Bytes, extract::multipart::Field};
use futures_util::StreamExt;
use std::path::Path;
use tracing::error;

/// An uploaded image buffered in memory.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl ImageUpload {
    /// Extension from the file name, falling back to the content type.
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .or_else(|| extension_for_content_type(&self.content_type))
            .unwrap_or_else(|| "bin".to_string())
    }
}

/// Prefers the subtype itself (`image/png` -> `png`) when it is a known
/// extension, otherwise the first registered one.
fn extension_for_content_type(content_type: &str) -> Option<String> {
    let exts = mime_guess::get_mime_extensions_str(content_type)?;
    let subtype = content_type
        .split('/')
        .nth(1)
        .map(|s| s.split(';').next().unwrap_or(s).trim().to_ascii_lowercase());

    subtype
        .filter(|s| exts.iter().any(|e| *e == s.as_str()))
        .or_else(|| exts.first().map(|e| e.to_string()))
}

pub fn is_image_content_type(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

/// Buffers a multipart `file` field, rejecting non-images and anything over `max_bytes`.
pub async fn read_image_field(mut field: Field<'_>, max_bytes: usize) -> Result<ImageUpload> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    if !is_image_content_type(&content_type) {
        return Err(anyhow!("Invalid content type {}: only image/* allowed", content_type));
    }

    let file_name = field.file_name().unwrap_or("image").to_string();
    let mut buffer = Vec::new();

    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| {
            error!("Stream error: {}", e);
            anyhow!("Stream interrupted")
        })?;

        if buffer.len() + chunk.len() > max_bytes {
            return Err(anyhow!("File exceeds the {} byte upload limit", max_bytes));
        }
        buffer.extend_from_slice(&chunk);
    }

    if buffer.is_empty() {
        return Err(anyhow!("Uploaded file is empty"));
    }

    Ok(ImageUpload {
        file_name,
        content_type,
        data: Bytes::from(buffer),
    })
}
