//! Error responder
//!
//! Every failure in the request path ends up here and leaves as a fixed
//! JSON shape: `{message}` for rejected input, `{message, error}` for
//! failures after the file was accepted.

use crate::record::PersistenceError;
use crate::upload::UploadError;
use crate::validate::ValidationError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Failures surfaced to HTTP clients
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Not Found")]
    NotFound,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiError {
    /// HTTP status for this failure
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Upload(_) | ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert into the response sent to the client
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();

        match self {
            ApiError::NotFound => text_response(status, "Not Found"),
            ApiError::Validation(e) => {
                tracing::warn!(error = %e, "Upload rejected");
                let message = e.to_string();
                json_response(
                    status,
                    &ErrorBody {
                        message: &message,
                        error: None,
                    },
                )
            }
            ApiError::Upload(e) => {
                tracing::error!(error = %e, "Upload error");
                upload_error(status, e.to_string())
            }
            ApiError::Persistence(e) => {
                tracing::error!(error = %e, "Upload error");
                upload_error(status, e.to_string())
            }
        }
    }
}

fn upload_error(status: StatusCode, error: String) -> Response<Full<Bytes>> {
    json_response(
        status,
        &ErrorBody {
            message: "Upload error",
            error: Some(error),
        },
    )
}

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(json) => with_content_type(status, "application/json", json),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode response body");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// Plain text response
pub fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    with_content_type(status, "text/plain; charset=utf-8", body)
}

/// Response with an explicit content type
pub(crate) fn with_content_type(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_maps_to_400() {
        let response = ApiError::from(ValidationError::NoFile).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"message": "No file uploaded"}));
    }

    #[tokio::test]
    async fn test_upload_error_maps_to_500() {
        let err = UploadError::ProviderError {
            status: 401,
            message: "Invalid api_key".into(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["message"], "Upload error");
        assert_eq!(json["error"], "Invalid api_key");
    }

    #[tokio::test]
    async fn test_persistence_error_maps_to_500() {
        let err = PersistenceError::Database("connection refused".into());
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Database error: connection refused");
    }

    #[test]
    fn test_not_found() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
