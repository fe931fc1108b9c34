//! Upload validation
//!
//! Decides whether an incoming file is accepted, using only its declared
//! filename and byte size. File contents are never inspected.

use crate::config::UploadConfig;
use thiserror::Error;

/// Reasons an upload is rejected before any remote call is made
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file uploaded")]
    NoFile,

    #[error("Only images are allowed ({allowed})")]
    DisallowedType { allowed: String },

    #[error("File too large")]
    TooLarge { limit: usize },

    #[error("Unexpected field: {0}")]
    UnexpectedField(String),

    #[error("Malformed upload: {0}")]
    Malformed(String),
}

/// Filename and size checks for uploaded files
#[derive(Debug, Clone)]
pub struct UploadValidator {
    allowed_extensions: Vec<String>,
    max_file_size: usize,
}

impl UploadValidator {
    /// Create a validator from explicit rules
    pub fn new<I, S>(allowed_extensions: I, max_file_size: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            max_file_size,
        }
    }

    /// Create a validator from upload configuration
    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(&config.allowed_extensions, config.max_file_size)
    }

    /// Maximum accepted size in bytes
    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Accept only filenames whose extension is in the allowed set
    pub fn check_filename(&self, filename: &str) -> Result<(), ValidationError> {
        let accepted = extension(filename)
            .map(|ext| self.allowed_extensions.iter().any(|a| *a == ext))
            .unwrap_or(false);

        if accepted {
            Ok(())
        } else {
            Err(ValidationError::DisallowedType {
                allowed: self.allowed_extensions.join(", "),
            })
        }
    }

    /// Accept only sizes within the configured limit
    pub fn check_size(&self, len: usize) -> Result<(), ValidationError> {
        if len > self.max_file_size {
            return Err(ValidationError::TooLarge {
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Run every check against a declared filename and size
    pub fn validate(&self, filename: &str, len: usize) -> Result<(), ValidationError> {
        self.check_filename(filename)?;
        self.check_size(len)
    }
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

/// Lowercased text after the last dot, if there is one
fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    // ".png" alone is a hidden file name, not an extension
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
