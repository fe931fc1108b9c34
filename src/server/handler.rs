//! Request handling
//!
//! Routes requests and runs the upload pipeline:
//! validate, upload to the media host, save the record, respond.

use super::error::{json_response, text_response, ApiError};
use super::multipart::{read_upload, UploadedFile};
use super::AppState;
use crate::metrics;
use crate::record::UploadRecord;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

/// Body of a liveness check
pub const LIVENESS_MESSAGE: &str = "Server is running...";

/// Message returned with a saved record
pub const UPLOAD_SUCCESS_MESSAGE: &str = "Image uploaded and saved successfully";

#[derive(Serialize)]
struct UploadResponse<'a> {
    message: &'a str,
    image: &'a UploadRecord,
}

/// Handle HTTP request
///
/// # Supported Endpoints
///
/// * `GET /`, `HEAD /` - Liveness check
/// * `POST /upload` - Multipart upload with the file in the `image` field
/// * All other requests return 404 Not Found
///
/// Never fails: every error is turned into a response by
/// [`ApiError::into_response`].
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    tracing::info!(method = %method, path = %path, "Handling request");

    let result = match (&method, path.as_str()) {
        (&Method::GET | &Method::HEAD, "/") => Ok(text_response(StatusCode::OK, LIVENESS_MESSAGE)),
        (&Method::POST, "/upload") => upload(req, &state).await,
        _ => Err(ApiError::NotFound),
    };

    Ok(result.unwrap_or_else(ApiError::into_response))
}

async fn upload<B>(req: Request<B>, state: &AppState) -> Result<Response<Full<Bytes>>, ApiError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let file = read_upload(
        content_type.as_deref(),
        req.into_body(),
        &state.validator,
        &state.field_name,
    )
    .await
    .inspect_err(|_| metrics::record_upload_failure("rejected"))?;

    tracing::info!(
        filename = %file.filename,
        bytes = file.data.len(),
        "Upload accepted"
    );

    let record = store_upload(state, file).await?;

    Ok(json_response(
        StatusCode::OK,
        &UploadResponse {
            message: UPLOAD_SUCCESS_MESSAGE,
            image: &record,
        },
    ))
}

/// Upload an accepted file and save its record
///
/// The media host call happens first. If the record cannot be saved the
/// hosted asset is left without a record; it is deleted only when
/// `cleanup_orphans` is enabled.
pub async fn store_upload(state: &AppState, file: UploadedFile) -> Result<UploadRecord, ApiError> {
    let bytes = file.data.len() as u64;

    let start_time = Instant::now();
    let asset = state
        .uploader
        .upload(file.data, &file.filename, state.folder.as_deref())
        .await
        .inspect_err(|_| {
            metrics::record_upload_failure("provider_error");
            metrics::record_error("provider");
        })?;
    metrics::record_stage_duration("provider", start_time.elapsed().as_secs_f64());

    let record = UploadRecord::from_asset(&asset, Some(file.filename));

    let start_time = Instant::now();
    if let Err(e) = state.store.insert(&record).await {
        metrics::record_upload_failure("persistence_error");
        metrics::record_error("persistence");
        tracing::warn!(
            public_id = %asset.public_id,
            url = %asset.secure_url,
            "Hosted asset has no record"
        );
        cleanup_orphan(state, &asset.public_id).await;
        return Err(e.into());
    }
    metrics::record_stage_duration("persist", start_time.elapsed().as_secs_f64());
    metrics::record_upload_success(bytes);

    tracing::info!(
        id = %record.id,
        public_id = %record.public_id,
        "Upload record saved"
    );

    Ok(record)
}

async fn cleanup_orphan(state: &AppState, public_id: &str) {
    if !state.cleanup_orphans {
        metrics::record_orphaned_asset("none");
        return;
    }

    match state.uploader.destroy(public_id).await {
        Ok(()) => {
            metrics::record_orphaned_asset("deleted");
            tracing::info!(public_id = %public_id, "Orphaned asset deleted");
        }
        Err(e) => {
            metrics::record_orphaned_asset("failed");
            tracing::error!(public_id = %public_id, error = %e, "Failed to delete orphaned asset");
        }
    }
}
