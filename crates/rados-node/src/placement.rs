//! Misdirection guard: resolves the requested key's placement group and rejects
//! requests that reached the wrong node. Validation and placement resolution are
//! folded into a single pass here since both steps need the same path parameter.

use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use rados_core::placement::Placement;
use rados_core::{ContentHash, RadosError};

use crate::error::ApiError;
use crate::state::AppState;

fn resolve(state: &AppState, hash: &str) -> Result<(ContentHash, Placement), Response> {
    let key = rados_core::validate(hash).map_err(|err| ApiError::from(err).into_response())?;
    let placement = state.placement_table.resolve(&key, state.config.node_id);
    Ok((key, placement))
}

fn misdirected(placement: &Placement) -> Response {
    ApiError::from(RadosError::Misdirected {
        pg_index: placement.pg_index,
        primary_host: placement.primary_host.clone(),
    })
    .into_response()
}

/// Guard for `/object/{hash}`: only the placement group's primary may serve
/// user-facing requests; everyone else is told where the primary is.
pub async fn require_primary(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    mut req: Request,
    next: Next,
) -> Response {
    let (key, placement) = match resolve(&state, &hash) {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    if !placement.is_primary {
        return misdirected(&placement);
    }
    req.extensions_mut().insert(key);
    req.extensions_mut().insert(placement);
    next.run(req).await
}

/// Guard for `/internal/{hash}`: any member of the placement group may serve
/// cluster-internal requests, since replicas and the primary all host a copy.
pub async fn require_member(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    mut req: Request,
    next: Next,
) -> Response {
    let (key, placement) = match resolve(&state, &hash) {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    if !placement.is_in_placement_group {
        return misdirected(&placement);
    }
    req.extensions_mut().insert(key);
    next.run(req).await
}
