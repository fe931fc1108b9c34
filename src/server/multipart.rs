//! Multipart form extraction
//!
//! The request body is buffered up to the file size limit plus an
//! allowance for framing and text fields, then parsed with `multer`.
//! Validation runs here, before the upload pipeline sees the file.

use crate::validate::{UploadValidator, ValidationError};
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use hyper::body::Body;
use multer::{Constraints, Multipart, SizeLimit};
use std::convert::Infallible;

/// Largest accepted text field value
pub const TEXT_FIELD_LIMIT: usize = 1024 * 1024;

/// Room for boundaries, part headers and text fields
pub const MULTIPART_OVERHEAD: usize = TEXT_FIELD_LIMIT + 64 * 1024;

/// Oversized bodies are read (and discarded) up to this multiple of the
/// limit so the client gets to see the rejection.
const DRAIN_FACTOR: usize = 4;

/// A file taken from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied filename
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Extract the single file carried in `field_name`
///
/// Non-multipart requests, forms without the file and file parts with an
/// empty filename all yield [`ValidationError::NoFile`]. Text fields are
/// ignored.
pub async fn read_upload<B>(
    content_type: Option<&str>,
    body: B,
    validator: &UploadValidator,
    field_name: &str,
) -> Result<UploadedFile, ValidationError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    let limit = validator.max_file_size().saturating_add(MULTIPART_OVERHEAD);
    let raw = collect_limited(body, limit)
        .await?
        .ok_or(ValidationError::TooLarge {
            limit: validator.max_file_size(),
        })?;

    let boundary = match content_type.map(multer::parse_boundary) {
        Some(Ok(boundary)) => boundary,
        _ => return Err(ValidationError::NoFile),
    };

    // The file's own limit is enforced exactly by the validator below
    let per_field = validator.max_file_size().max(TEXT_FIELD_LIMIT);
    let constraints = Constraints::new().size_limit(SizeLimit::new().per_field(per_field as u64));
    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(raw) });
    let mut multipart = Multipart::with_constraints(stream, boundary, constraints);

    let mut upload: Option<UploadedFile> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multer_error)? {
        // Browsers send an empty filename for a file input left blank
        let Some(filename) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            continue;
        };
        let name = field.name().unwrap_or_default().to_string();

        if name != field_name || upload.is_some() {
            return Err(ValidationError::UnexpectedField(name));
        }

        // Reject on the declared name before reading any file bytes
        validator.check_filename(&filename)?;

        let content_type = field.content_type().map(|mime| mime.to_string());
        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(multer_error)? {
            data.extend_from_slice(&chunk);
            validator.check_size(data.len())?;
        }

        upload = Some(UploadedFile {
            filename,
            content_type,
            data: data.freeze(),
        });
    }

    upload.ok_or(ValidationError::NoFile)
}

/// Buffer a body, returning `None` once it grows past `limit`
async fn collect_limited<B>(mut body: B, limit: usize) -> Result<Option<Bytes>, ValidationError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    let mut buffer = BytesMut::new();
    let mut seen = 0usize;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| ValidationError::Malformed(e.to_string()))?;
        let Ok(data) = frame.into_data() else {
            continue;
        };

        seen = seen.saturating_add(data.len());
        if seen <= limit {
            buffer.extend_from_slice(&data);
        } else if seen > limit.saturating_mul(DRAIN_FACTOR) {
            break;
        }
    }

    if seen > limit {
        return Ok(None);
    }
    Ok(Some(buffer.freeze()))
}

fn multer_error(err: multer::Error) -> ValidationError {
    match err {
        multer::Error::FieldSizeExceeded { limit, .. }
        | multer::Error::StreamSizeExceeded { limit } => ValidationError::TooLarge {
            limit: limit as usize,
        },
        other => ValidationError::Malformed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    const BOUNDARY: &str = "X-IMAGE-RELAY-BOUNDARY";

    fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    fn file_part(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
        let mut part = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, field, filename
        )
        .into_bytes();
        part.extend_from_slice(data);
        part.extend_from_slice(b"\r\n");
        part
    }

    fn text_part(field: &str, value: &str) -> Vec<u8> {
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, field, value
        )
        .into_bytes()
    }

    fn form(parts: Vec<Vec<u8>>) -> Full<Bytes> {
        let mut body: Vec<u8> = parts.concat();
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Full::new(Bytes::from(body))
    }

    async fn read(parts: Vec<Vec<u8>>, validator: &UploadValidator) -> Result<UploadedFile, ValidationError> {
        read_upload(Some(&content_type()), form(parts), validator, "image").await
    }

    #[tokio::test]
    async fn test_reads_image_field() {
        let validator = UploadValidator::default();
        let file = read(
            vec![text_part("caption", "hello"), file_part("image", "cat.PNG", b"png-bytes")],
            &validator,
        )
        .await
        .unwrap();

        assert_eq!(file.filename, "cat.PNG");
        assert_eq!(file.data, Bytes::from_static(b"png-bytes"));
        assert_eq!(file.content_type.as_deref(), Some("application/octet-stream"));
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let validator = UploadValidator::default();
        let err = read(vec![text_part("caption", "hello")], &validator)
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::NoFile);
    }

    #[tokio::test]
    async fn test_non_multipart_request_has_no_file() {
        let validator = UploadValidator::default();
        let err = read_upload(
            Some("application/json"),
            Full::new(Bytes::from_static(b"{}")),
            &validator,
            "image",
        )
        .await
        .unwrap_err();
        assert_eq!(err, ValidationError::NoFile);

        let err = read_upload(None, Full::new(Bytes::new()), &validator, "image")
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::NoFile);
    }

    #[tokio::test]
    async fn test_blank_file_input_has_no_file() {
        let validator = UploadValidator::default();
        let err = read(vec![file_part("image", "", b"")], &validator)
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::NoFile);
    }

    #[tokio::test]
    async fn test_blank_file_input_before_real_file() {
        let validator = UploadValidator::default();
        let file = read(
            vec![file_part("image", "", b""), file_part("image", "cat.jpg", b"jpg")],
            &validator,
        )
        .await
        .unwrap();
        assert_eq!(file.filename, "cat.jpg");
    }

    #[tokio::test]
    async fn test_large_text_fields_do_not_count_against_file() {
        let validator = UploadValidator::new(["png"], 16);
        let caption = "c".repeat(100 * 1024);
        let file = read(
            vec![text_part("caption", &caption), file_part("image", "fits.png", &[0u8; 16])],
            &validator,
        )
        .await
        .unwrap();
        assert_eq!(file.data.len(), 16);
    }

    #[tokio::test]
    async fn test_disallowed_extension() {
        let validator = UploadValidator::default();
        let err = read(vec![file_part("image", "notes.txt", b"text")], &validator)
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::DisallowedType { .. }));
    }

    #[tokio::test]
    async fn test_file_under_other_field_name() {
        let validator = UploadValidator::default();
        let err = read(vec![file_part("avatar", "cat.png", b"x")], &validator)
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::UnexpectedField("avatar".into()));
    }

    #[tokio::test]
    async fn test_second_file_is_rejected() {
        let validator = UploadValidator::default();
        let err = read(
            vec![file_part("image", "a.png", b"a"), file_part("image", "b.png", b"b")],
            &validator,
        )
        .await
        .unwrap_err();
        assert_eq!(err, ValidationError::UnexpectedField("image".into()));
    }

    #[tokio::test]
    async fn test_file_over_limit() {
        let validator = UploadValidator::new(["png"], 16);
        let err = read(vec![file_part("image", "big.png", &[0u8; 17])], &validator)
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { .. }));

        let ok = read(vec![file_part("image", "fits.png", &[0u8; 16])], &validator).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_body_far_over_limit() {
        let validator = UploadValidator::new(["png"], 16);
        let huge = vec![0u8; MULTIPART_OVERHEAD + 1024];
        let err = read(vec![file_part("image", "huge.png", &huge)], &validator)
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::TooLarge { limit: 16 });
    }
}
