//! Media Upload Pipeline
//!
//! Takes a base64 image payload, validates it, stages it to a local
//! transient file, forwards it to the external image host and returns the
//! durable URL. The staged file is owned by a guard and removed when the
//! guard drops, on the success and failure paths alike.

pub mod http_host;
pub mod mock_host;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on a decoded image payload, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5_000_000;

/// Folder labels on the external host.
pub const COMMENTS_FOLDER: &str = "comments";
pub const AVATARS_FOLDER: &str = "avatars";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("payload of {0} bytes exceeds the upload ceiling")]
    TooLarge(usize),
    #[error("invalid image payload: {0}")]
    InvalidPayload(String),
    #[error("staging failed: {0}")]
    Staging(#[from] io::Error),
    #[error("upload failed: {0}")]
    Upload(String),
}

/// Result of a successful upload to the external host.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedMedia {
    pub secure_url: String,
}

/// Interface to the external image host. Assumed to fail closed: any
/// non-success response is a hard failure of the calling workflow step.
#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(&self, file: &Path, folder: &str) -> Result<UploadedMedia, MediaError>;
}

/// A decoded image payload with its declared content type.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ImagePayload {
    /// Parse a `data:<mime>;base64,<payload>` string. The declared mime
    /// type is taken from the prefix; a bare base64 string carries no
    /// declared type and will fail the image-kind validation later.
    pub fn from_base64(input: &str) -> Result<Self, MediaError> {
        let input = input.trim();
        let (content_type, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| MediaError::InvalidPayload("missing data separator".into()))?;
                let mime = header
                    .strip_suffix(";base64")
                    .ok_or_else(|| MediaError::InvalidPayload("not base64 encoded".into()))?;
                (mime.to_string(), payload)
            }
            None => ("application/octet-stream".to_string(), input),
        };

        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let data = BASE64
            .decode(cleaned.as_bytes())
            .map_err(|e| MediaError::InvalidPayload(e.to_string()))?;
        Ok(Self { content_type, data })
    }

    /// Reject payloads that are not an image kind or exceed the ceiling.
    pub fn validate(&self) -> Result<(), MediaError> {
        if !self.content_type.starts_with("image/") {
            return Err(MediaError::UnsupportedType(self.content_type.clone()));
        }
        if self.data.len() > MAX_IMAGE_BYTES {
            return Err(MediaError::TooLarge(self.data.len()));
        }
        Ok(())
    }

    /// File extension for the staged copy, derived from the subtype.
    pub fn extension(&self) -> &str {
        match self.content_type.split('/').nth(1) {
            Some("png") => "png",
            Some("gif") => "gif",
            Some("webp") => "webp",
            _ => "jpg",
        }
    }
}

/// A transient local file removed when the guard drops.
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub fn create(dir: &Path, name: &str, data: &[u8]) -> Result<Self, MediaError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        fs::write(&path, data)?;
        debug!("staged {} bytes at {}", data.len(), path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to remove staged file {}: {}", self.path.display(), e);
        }
    }
}

pub struct MediaPipeline {
    host: Arc<dyn MediaHost>,
    staging_dir: PathBuf,
}

impl MediaPipeline {
    pub fn new(host: Arc<dyn MediaHost>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            host,
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Validate, stage, upload, clean up. Staged names embed the caller
    /// hint, a millisecond timestamp and a random id so concurrent uploads
    /// never collide.
    pub async fn stage_and_upload(
        &self,
        image: &ImagePayload,
        folder: &str,
        name_hint: &str,
    ) -> Result<String, MediaError> {
        image.validate()?;

        let name = format!(
            "{}-{}-{}.{}",
            name_hint,
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            image.extension()
        );
        let staged = StagedFile::create(&self.staging_dir, &name, &image.data)?;
        let uploaded = self.host.upload(staged.path(), folder).await?;
        info!(
            "uploaded {} bytes to folder '{}' as {}",
            image.data.len(),
            folder,
            uploaded.secure_url
        );
        Ok(uploaded.secure_url)
    }
}

#[cfg(test)]
mod tests {
    use super::mock_host::MockMediaHost;
    use super::*;

    const TINY_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn encode(content_type: &str, data: &[u8]) -> String {
        format!("data:{};base64,{}", content_type, BASE64.encode(data))
    }

    #[test]
    fn parses_data_url() {
        let payload = ImagePayload::from_base64(&encode("image/png", TINY_PNG)).unwrap();
        assert_eq!(payload.content_type, "image/png");
        assert_eq!(payload.data, TINY_PNG);
        assert_eq!(payload.extension(), "png");
    }

    #[test]
    fn bare_base64_has_no_declared_image_type() {
        let payload = ImagePayload::from_base64(&BASE64.encode(TINY_PNG)).unwrap();
        assert!(matches!(
            payload.validate(),
            Err(MediaError::UnsupportedType(_))
        ));
    }

    #[test]
    fn rejects_non_image_type() {
        let payload = ImagePayload::from_base64(&encode("text/plain", b"hello")).unwrap();
        assert!(matches!(
            payload.validate(),
            Err(MediaError::UnsupportedType(_))
        ));
    }

    #[test]
    fn rejects_oversized_payload() {
        let payload = ImagePayload {
            content_type: "image/jpeg".to_string(),
            data: vec![0u8; MAX_IMAGE_BYTES + 1],
        };
        assert!(matches!(payload.validate(), Err(MediaError::TooLarge(_))));
    }

    #[test]
    fn payload_at_ceiling_is_accepted() {
        let payload = ImagePayload {
            content_type: "image/jpeg".to_string(),
            data: vec![0u8; MAX_IMAGE_BYTES],
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn malformed_base64_is_rejected() {
        assert!(ImagePayload::from_base64("data:image/png;base64,@@@").is_err());
        assert!(ImagePayload::from_base64("data:image/png,abc").is_err());
    }

    #[test]
    fn staged_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let staged = StagedFile::create(dir.path(), "probe.jpg", b"bytes").unwrap();
            assert!(staged.path().exists());
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn pipeline_cleans_up_after_successful_upload() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MockMediaHost::new());
        let pipeline = MediaPipeline::new(host.clone(), dir.path());

        let payload = ImagePayload::from_base64(&encode("image/png", TINY_PNG)).unwrap();
        let url = pipeline
            .stage_and_upload(&payload, COMMENTS_FOLDER, "u1-b1")
            .await
            .unwrap();

        assert!(url.starts_with("https://"));
        let uploads = host.uploads();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].existed);
        assert_eq!(uploads[0].folder, COMMENTS_FOLDER);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn pipeline_cleans_up_after_failed_upload() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = MediaPipeline::new(Arc::new(MockMediaHost::failing()), dir.path());

        let payload = ImagePayload::from_base64(&encode("image/png", TINY_PNG)).unwrap();
        let err = pipeline
            .stage_and_upload(&payload, COMMENTS_FOLDER, "u1-b1")
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Upload(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_the_host() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MockMediaHost::new());
        let pipeline = MediaPipeline::new(host.clone(), dir.path());

        let payload = ImagePayload::from_base64(&encode("text/plain", b"hi")).unwrap();
        assert!(pipeline
            .stage_and_upload(&payload, AVATARS_FOLDER, "u1")
            .await
            .is_err());
        assert_eq!(host.upload_count(), 0);
    }
}
