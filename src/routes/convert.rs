//! The batch conversion endpoint.
//!
//! `POST /<route_name>` with `multipart/form-data`: one or more `images`
//! file parts, an optional `descriptors` JSON field, and whitelisted query
//! parameters. The transport concerns live here — spooling each part to
//! disk and classifying receive failures — while all per-file decisions
//! belong to the pipeline.

use crate::error::{GatewayError, GatewayResult};
use crate::pipeline::intake::{UploadErrorCode, UploadItem};
use crate::pipeline::report::BatchReport;
use crate::pipeline::Scratch;
use crate::state::GatewayState;
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, Query, State};
use axum::Json;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Convert a batch of uploaded images to WebP.
///
/// Every uploaded file produces exactly one result record; only transport
/// or descriptor problems abort the request as a whole.
pub async fn convert_batch(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<HashMap<String, String>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> GatewayResult<Json<BatchReport>> {
    let started = Instant::now();
    let scratch = Scratch::new();

    // A request that is not multipart at all carries no images.
    let mut multipart = multipart.map_err(|_| GatewayError::NoImages)?;

    let mut uploads: Vec<UploadItem> = Vec::new();
    let mut descriptor_body: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("images") => uploads.push(spool_upload(&state, field, &scratch).await),
            Some("descriptors") => {
                descriptor_body = Some(field.text().await.map_err(bad_multipart)?);
            }
            _ => {}
        }
    }

    if uploads.is_empty() {
        return Err(GatewayError::NoImages);
    }

    tracing::debug!(files = uploads.len(), "starting conversion batch");

    let records = state
        .pipeline
        .run(&params, descriptor_body.as_deref(), uploads, &scratch)
        .await?;

    Ok(Json(BatchReport::new(records, started.elapsed())))
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> GatewayError {
    GatewayError::BadRequest(format!("Malformed multipart request: {err}"))
}

/// Receive one `images` part and spool it into the temp directory.
///
/// Never fails the request: every receive problem is folded into the item's
/// transport error code so the file still gets its result record.
async fn spool_upload(state: &GatewayState, field: Field<'_>, scratch: &Scratch) -> UploadItem {
    let filename = field.file_name().map(str::to_string).unwrap_or_default();
    if filename.is_empty() {
        return UploadItem::failed(filename, UploadErrorCode::NoFile);
    }

    let body: Bytes = match field.bytes().await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(filename = %filename, error = %err, "upload ended early");
            return UploadItem::failed(filename, UploadErrorCode::Partial);
        }
    };

    if body.len() > state.config.max_file_size() {
        return UploadItem::failed(filename, UploadErrorCode::SizeExceeded);
    }

    let temp_dir = &state.config.temp_dir;
    if !temp_dir.is_dir() {
        return UploadItem::failed(filename, UploadErrorCode::NoTempDir);
    }

    let spool_path = temp_dir.join(format!("spool-{}", Uuid::new_v4().simple()));
    scratch.register(spool_path.clone());

    match tokio::fs::write(&spool_path, &body).await {
        Ok(()) => UploadItem::spooled(filename, spool_path, body.len() as u64),
        Err(err) => {
            tracing::warn!(filename = %filename, error = %err, "failed to spool upload");
            UploadItem::failed(filename, UploadErrorCode::WriteFailure)
        }
    }
}
