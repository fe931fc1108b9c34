//! Cloudinary client
//!
//! Uploads image buffers through the signed upload API and deletes assets
//! through the destroy API.
//!
//! # Example
//!
//! ```no_run
//! use image_relay::config::CloudinaryConfig;
//! use image_relay::upload::{CloudinaryClient, MediaUploader};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CloudinaryConfig {
//!     cloud_name: Some("demo".to_string()),
//!     api_key: Some("1234567890".to_string()),
//!     api_secret: Some("secret".to_string()),
//!     ..Default::default()
//! };
//! let client = CloudinaryClient::new(config)?;
//!
//! let body = Bytes::from_static(b"\x89PNG...");
//! let asset = client.upload(body, "cat.png", Some("gallery")).await?;
//! println!("Hosted at {}", asset.secure_url);
//! # Ok(())
//! # }
//! ```

use super::signature::{sign, SIGNATURE_ALGORITHM};
use super::{HostedAsset, MediaUploader, UploadError};
use crate::config::CloudinaryConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Credentials resolved from configuration
struct Credentials<'a> {
    cloud_name: &'a str,
    api_key: &'a str,
    api_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary upload API client
pub struct CloudinaryClient {
    config: CloudinaryConfig,
    http_client: reqwest::Client,
}

impl CloudinaryClient {
    /// Create a new client
    ///
    /// Missing credentials are not an error here; calls fail with
    /// [`UploadError::MissingCredentials`] instead.
    pub fn new(config: CloudinaryConfig) -> Result<Self, UploadError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| UploadError::RequestError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Whether all three credentials are present
    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    /// URL for an image API action (`upload`, `destroy`)
    pub fn endpoint(&self, action: &str) -> Result<String, UploadError> {
        let creds = self.credentials()?;
        Ok(format!(
            "{}/v1_1/{}/image/{}",
            self.config.api_base.trim_end_matches('/'),
            creds.cloud_name,
            action
        ))
    }

    fn credentials(&self) -> Result<Credentials<'_>, UploadError> {
        let cloud_name = self
            .config
            .cloud_name
            .as_deref()
            .ok_or(UploadError::MissingCredentials("CLOUDINARY_CLOUD_NAME"))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(UploadError::MissingCredentials("CLOUDINARY_API_KEY"))?;
        let api_secret = self
            .config
            .api_secret
            .as_deref()
            .ok_or(UploadError::MissingCredentials("CLOUDINARY_API_SECRET"))?;

        Ok(Credentials {
            cloud_name,
            api_key,
            api_secret,
        })
    }

    /// Add api_key, timestamp and signature fields to a form
    fn signed_form(
        &self,
        mut params: BTreeMap<&'static str, String>,
    ) -> Result<Form, UploadError> {
        let creds = self.credentials()?;
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        let signature = sign(&params, creds.api_secret);

        let mut form = Form::new();
        for (key, value) in params {
            if !value.is_empty() {
                form = form.text(key, value);
            }
        }

        Ok(form
            .text("api_key", creds.api_key.to_string())
            .text("signature", signature)
            .text("signature_algorithm", SIGNATURE_ALGORITHM))
    }

    async fn post(&self, action: &str, form: Form) -> Result<Bytes, UploadError> {
        let response = self
            .http_client
            .post(self.endpoint(action)?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::RequestError(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UploadError::RequestError(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(UploadError::ProviderError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl MediaUploader for CloudinaryClient {
    #[tracing::instrument(
        name = "cloudinary.upload",
        skip(self, data),
        fields(
            upload.filename = %filename,
            upload.folder = ?folder,
            upload.bytes = data.len(),
            cloudinary.public_id = tracing::field::Empty
        ),
        err
    )]
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        folder: Option<&str>,
    ) -> Result<HostedAsset, UploadError> {
        let start_time = Instant::now();
        let len = data.len() as u64;

        let mut params = BTreeMap::new();
        if let Some(folder) = folder {
            params.insert("folder", folder.to_string());
        }

        let file = Part::stream_with_length(reqwest::Body::from(data), len)
            .file_name(filename.to_string());
        let form = self.signed_form(params)?.part("file", file);

        let body = self.post("upload", form).await?;
        let asset: HostedAsset = serde_json::from_slice(&body)
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;

        tracing::Span::current().record("cloudinary.public_id", asset.public_id.as_str());
        tracing::info!(
            public_id = %asset.public_id,
            bytes = len,
            duration_ms = start_time.elapsed().as_millis(),
            "Cloudinary upload completed"
        );

        Ok(asset)
    }

    #[tracing::instrument(name = "cloudinary.destroy", skip(self), err)]
    async fn destroy(&self, public_id: &str) -> Result<(), UploadError> {
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());

        let form = self.signed_form(params)?;
        let body = self.post("destroy", form).await?;
        let response: DestroyResponse = serde_json::from_slice(&body)
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;

        if response.result != "ok" {
            return Err(UploadError::ProviderError {
                status: 200,
                message: format!("destroy returned '{}'", response.result),
            });
        }

        tracing::info!(public_id = %public_id, "Cloudinary asset deleted");
        Ok(())
    }
}
