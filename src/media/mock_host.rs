//! Mock implementation of the media host for testing.

use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use crate::media::{MediaError, MediaHost, UploadedMedia};

/// What the mock observed about one upload call.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub file_name: String,
    pub folder: String,
    /// Whether the staged file existed on disk at upload time.
    pub existed: bool,
    pub size: u64,
}

pub struct MockMediaHost {
    uploads: Mutex<Vec<RecordedUpload>>,
    fail: bool,
}

impl MockMediaHost {
    pub fn new() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A host whose every upload attempt fails, for failure-path tests.
    pub fn failing() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

impl Default for MockMediaHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaHost for MockMediaHost {
    async fn upload(&self, file: &Path, folder: &str) -> Result<UploadedMedia, MediaError> {
        if self.fail {
            return Err(MediaError::Upload("mock upload failure".to_string()));
        }

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = fs::metadata(file).ok();

        self.uploads.lock().unwrap().push(RecordedUpload {
            file_name: file_name.clone(),
            folder: folder.to_string(),
            existed: metadata.is_some(),
            size: metadata.map(|m| m.len()).unwrap_or(0),
        });

        Ok(UploadedMedia {
            secure_url: format!("https://media.invalid/{}/{}", folder, file_name),
        })
    }
}
