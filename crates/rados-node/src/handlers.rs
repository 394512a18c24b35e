//! PUT/GET/DELETE handlers for the user-facing (`/object`) and cluster-internal
//! (`/internal`) endpoint families. Each pair shares the same core logic; only
//! `is_primary` (whether this node fans out to replicas) and the peer list differ.

use axum::extract::{Extension, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use rados_core::placement::Placement;
use rados_core::{ContentHash, RadosError};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("invalid multipart body: {err}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::BadRequest(format!("reading form field 'file': {err}")))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::BadRequest("missing form field 'file'".into()))
}

async fn do_put(
    state: &AppState,
    key: ContentHash,
    is_primary: bool,
    peers: &[String],
    mut multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    let content = read_file_field(&mut multipart).await?;

    if content.len() as u64 > state.config.max_object_size_bytes {
        return Err(RadosError::TooLarge.into());
    }

    state.coordinator.write(key, content, is_primary, peers).await?;
    Ok(StatusCode::OK)
}

async fn do_get(state: &AppState, key: ContentHash) -> Result<Response, ApiError> {
    let lease = state.coordinator.read(key).await?;
    let bytes = tokio::fs::read(lease.path()).await.map_err(RadosError::from)?;
    lease.end();
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

async fn do_delete(
    state: &AppState,
    key: ContentHash,
    is_primary: bool,
    peers: &[String],
) -> Result<StatusCode, ApiError> {
    state.coordinator.delete(key, is_primary, peers).await?;
    Ok(StatusCode::OK)
}

pub async fn put_object(
    State(state): State<AppState>,
    Extension(key): Extension<ContentHash>,
    Extension(placement): Extension<Placement>,
    multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    do_put(&state, key, true, &placement.replica_hosts, multipart).await
}

pub async fn get_object(
    State(state): State<AppState>,
    Extension(key): Extension<ContentHash>,
) -> Result<Response, ApiError> {
    do_get(&state, key).await
}

pub async fn delete_object(
    State(state): State<AppState>,
    Extension(key): Extension<ContentHash>,
    Extension(placement): Extension<Placement>,
) -> Result<StatusCode, ApiError> {
    do_delete(&state, key, true, &placement.replica_hosts).await
}

pub async fn put_object_internal(
    State(state): State<AppState>,
    Extension(key): Extension<ContentHash>,
    multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    do_put(&state, key, false, &[], multipart).await
}

pub async fn get_object_internal(
    State(state): State<AppState>,
    Extension(key): Extension<ContentHash>,
) -> Result<Response, ApiError> {
    do_get(&state, key).await
}

pub async fn delete_object_internal(
    State(state): State<AppState>,
    Extension(key): Extension<ContentHash>,
) -> Result<StatusCode, ApiError> {
    do_delete(&state, key, false, &[]).await
}
