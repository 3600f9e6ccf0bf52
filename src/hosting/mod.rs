// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Card image hosting
//!
//! Uploads captured card images to a public host and returns the hosted
//! URL. Hosting is best-effort at the intake layer: a failed upload is
//! recorded as an empty URL, never a lost card.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::capture::CardImage;

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Errors from image hosting backends
#[derive(Debug, Error)]
pub enum HostError {
    /// No hosting backend is configured
    #[error("Image hosting is not configured")]
    NotConfigured,

    /// The host rejected the upload
    #[error("Upload rejected: HTTP {status}: {message}")]
    Upload { status: u16, message: String },

    /// Transport-level failure
    #[error("Upload request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Trait for image hosting backends
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload one image, returning its public URL
    async fn upload(&self, image: &CardImage) -> Result<String, HostError>;
}

/// Cloudinary unsigned-upload host
///
/// Uses the unsigned upload flow: a multipart POST carrying the image and
/// an upload preset name, no API secret involved.
pub struct CloudinaryHost {
    client: Client,
    api_base: String,
    cloud_name: String,
    upload_preset: String,
}

impl CloudinaryHost {
    pub fn new(cloud_name: &str, upload_preset: &str) -> Self {
        Self::with_api_base(CLOUDINARY_API_BASE, cloud_name, upload_preset)
    }

    /// Host pointed at a non-default API base, for tests and proxies
    pub fn with_api_base(api_base: &str, cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            cloud_name: cloud_name.to_string(),
            upload_preset: upload_preset.to_string(),
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/image/upload", self.api_base, self.cloud_name)
    }
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, image: &CardImage) -> Result<String, HostError> {
        let part = Part::bytes(image.bytes().to_vec())
            .file_name("card")
            .mime_str(image.mime_type())?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            warn!("Cloudinary upload rejected: HTTP {}: {}", status, message);
            return Err(HostError::Upload {
                status: status.as_u16(),
                message,
            });
        }

        match body["secure_url"].as_str() {
            Some(url) => {
                debug!("Image hosted at {}", url);
                Ok(url.to_string())
            }
            None => Err(HostError::Upload {
                status: status.as_u16(),
                message: "response missing secure_url".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    fn image() -> CardImage {
        CardImage::from_bytes(STANDARD.decode(TINY_PNG_BASE64).unwrap()).unwrap()
    }

    #[test]
    fn test_upload_url_includes_cloud_name() {
        let host = CloudinaryHost::new("demo-cloud", "unsigned_cards");
        assert_eq!(
            host.upload_url(),
            "https://api.cloudinary.com/v1_1/demo-cloud/image/upload"
        );
    }

    #[test]
    fn test_with_api_base_trims_trailing_slash() {
        let host = CloudinaryHost::with_api_base("http://localhost:9000/", "demo", "preset");
        assert_eq!(host.upload_url(), "http://localhost:9000/demo/image/upload");
    }

    #[tokio::test]
    async fn test_upload_unreachable_host_is_http_error() {
        let host =
            CloudinaryHost::with_api_base("http://127.0.0.1:59998", "demo", "unsigned_cards");
        let err = host.upload(&image()).await.unwrap_err();
        assert!(matches!(err, HostError::Http(_)));
    }
}
