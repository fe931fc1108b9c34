//! Upload module
//!
//! Forwards accepted files to the remote media host and returns the
//! hosted asset descriptor.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cloudinary;
pub mod signature;

pub use cloudinary::CloudinaryClient;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Media host credentials are not configured: {0}")]
    MissingCredentials(&'static str),

    #[error("Request to media host failed: {0}")]
    RequestError(String),

    #[error("{message}")]
    ProviderError { status: u16, message: String },

    #[error("Unexpected media host response: {0}")]
    InvalidResponse(String),
}

/// Descriptor of an asset stored by the media host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedAsset {
    /// Public https location of the asset
    pub secure_url: String,
    /// Provider-assigned identifier, used for later deletion
    pub public_id: String,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub format: Option<String>,
}

/// Remote media host
///
/// One call is one attempt: implementations do not retry.
#[async_trait::async_trait]
pub trait MediaUploader: Send + Sync {
    /// Store `data` under `folder` and describe the resulting asset
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        folder: Option<&str>,
    ) -> Result<HostedAsset, UploadError>;

    /// Delete a previously uploaded asset
    async fn destroy(&self, public_id: &str) -> Result<(), UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_displays_message_only() {
        let err = UploadError::ProviderError {
            status: 401,
            message: "Invalid Signature".into(),
        };
        assert_eq!(err.to_string(), "Invalid Signature");
    }

    #[test]
    fn test_hosted_asset_from_provider_json() {
        let asset: HostedAsset = serde_json::from_str(
            r#"{"public_id":"gallery/abc","secure_url":"https://res.cloudinary.com/demo/image/upload/v1/gallery/abc.png","width":10}"#,
        )
        .unwrap();
        assert_eq!(asset.public_id, "gallery/abc");
        assert!(asset.bytes.is_none());
    }
}
