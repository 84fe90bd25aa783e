use bytes::Bytes;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::MAX_ASSET_BYTES;

/// Image picked by the user, as reported by the platform picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReference {
    pub uri: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl AssetReference {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            file_name: None,
            mime_type: None,
        }
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Asset bytes ready to be attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedAsset {
    pub bytes: Bytes,
    pub mime_type: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("asset not found: {uri}")]
    NotFound { uri: String },

    #[error("unsupported asset URI '{uri}'")]
    UnsupportedUri { uri: String },

    #[error("failed to read asset {uri}: {message}")]
    Io { uri: String, message: String },

    #[error("asset is empty")]
    Empty,

    #[error("asset too large: {size} bytes, max {max}")]
    TooLarge { size: usize, max: usize },

    #[error("unsupported image format")]
    UnsupportedFormat,
}

const SUPPORTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Checks that `bytes` are a supported image within `max_bytes` and
/// resolves the MIME type, preferring the one the picker reported.
pub fn inspect_image(
    bytes: Bytes,
    declared_mime: Option<&str>,
    max_bytes: usize,
) -> Result<LoadedAsset, AssetError> {
    if bytes.is_empty() {
        return Err(AssetError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(AssetError::TooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }

    let format = image::guess_format(&bytes).map_err(|_| AssetError::UnsupportedFormat)?;
    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(AssetError::UnsupportedFormat);
    }

    let mime_type = declared_mime
        .map(str::trim)
        .filter(|m| m.starts_with("image/"))
        .map_or_else(|| format.to_mime_type().to_string(), str::to_string);

    Ok(LoadedAsset { bytes, mime_type })
}

/// Resolves an [`AssetReference`] to bytes.
#[async_trait::async_trait]
pub trait AssetSource: Send + Sync {
    async fn load(&self, asset: &AssetReference) -> Result<LoadedAsset, AssetError>;
}

/// Loads assets from the local filesystem (`file://` URIs or plain paths).
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    max_bytes: usize,
}

impl Default for FsAssetSource {
    fn default() -> Self {
        Self::new(MAX_ASSET_BYTES)
    }
}

impl FsAssetSource {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    fn path_for(uri: &str) -> Result<PathBuf, AssetError> {
        if let Some(rest) = uri.strip_prefix("file://") {
            return Ok(PathBuf::from(rest));
        }
        if uri.contains("://") || uri.trim().is_empty() {
            return Err(AssetError::UnsupportedUri {
                uri: uri.to_string(),
            });
        }
        Ok(PathBuf::from(uri))
    }
}

#[async_trait::async_trait]
impl AssetSource for FsAssetSource {
    #[instrument(skip(self, asset), fields(uri = %asset.uri))]
    async fn load(&self, asset: &AssetReference) -> Result<LoadedAsset, AssetError> {
        let path = Self::path_for(&asset.uri)?;

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound {
                    uri: asset.uri.clone(),
                }
            } else {
                AssetError::Io {
                    uri: asset.uri.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.max_bytes {
            return Err(AssetError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| AssetError::Io {
            uri: asset.uri.clone(),
            message: e.to_string(),
        })?;
        debug!(size = bytes.len(), "asset read");

        inspect_image(Bytes::from(bytes), asset.mime_type.as_deref(), self.max_bytes)
    }
}
