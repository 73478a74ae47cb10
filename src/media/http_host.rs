//! HTTP client for the external image host.
//!
//! Posts the staged file as a multipart form to the configured upload
//! endpoint and expects a JSON body carrying `secure_url`. Any non-success
//! status is a hard failure.

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use std::path::Path;

use crate::config::MediaConfig;
use crate::media::{MediaError, MediaHost, UploadedMedia};

pub struct HttpMediaHost {
    client: reqwest::Client,
    upload_url: String,
    api_key: String,
}

impl HttpMediaHost {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: config.upload_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl MediaHost for HttpMediaHost {
    async fn upload(&self, file: &Path, folder: &str) -> Result<UploadedMedia, MediaError> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        debug!("forwarding {} ({} bytes) to {}", file_name, bytes.len(), self.upload_url);

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("folder", folder.to_string())
            .text("api_key", self.api_key.clone())
            .text("use_filename", "true");

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| MediaError::Upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Upload(format!(
                "host rejected upload with status {status}"
            )));
        }

        response
            .json::<UploadedMedia>()
            .await
            .map_err(|e| MediaError::Upload(format!("malformed host response: {e}")))
    }
}
