//! Bearer-token authentication, constant-time so a timing side channel can't
//! reveal how much of a guessed token matched. An empty configured token
//! disables authentication entirely for that endpoint family.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

fn tokens_match(expected: &str, provided: &str) -> bool {
    expected.len() == provided.len() && bool::from(expected.as_bytes().ct_eq(provided.as_bytes()))
}

fn check_bearer(expected: &str, req: &Request) -> Result<(), ApiError> {
    if expected.is_empty() {
        return Ok(());
    }

    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    let Some(provided) = header.strip_prefix(BEARER_PREFIX) else {
        return Err(ApiError::Unauthorized(
            "authorization header was empty or didn't contain a bearer token".into(),
        ));
    };

    if !tokens_match(expected, provided) {
        return Err(ApiError::Unauthorized("the provided bearer token is invalid".into()));
    }

    Ok(())
}

/// Guard for `/object/{hash}`: the user-facing bearer token.
pub async fn require_user_bearer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match check_bearer(&state.config.user_bearer_token, &req) {
        Ok(()) => next.run(req).await,
        Err(err) => axum::response::IntoResponse::into_response(err),
    }
}

/// Guard for `/internal/{hash}`: the cluster-internal bearer token, distinct from
/// the user-facing one.
pub async fn require_cluster_bearer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match check_bearer(&state.config.cluster_bearer_token, &req) {
        Ok(()) => next.run(req).await,
        Err(err) => axum::response::IntoResponse::into_response(err),
    }
}
