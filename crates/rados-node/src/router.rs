//! Builds the axum router: two guarded endpoint families (user-facing `/object`,
//! cluster-internal `/internal`) plus an unauthenticated health check, wrapped in
//! request tracing and panic recovery so a handler panic maps to 500 instead of
//! tearing down the whole server.

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{auth, handlers, placement};

fn request_span(request: &Request) -> tracing::Span {
    tracing::info_span!(
        "request",
        request_id = %uuid::Uuid::new_v4(),
        method = %request.method(),
        uri = %request.uri(),
    )
}

pub fn build_router(state: AppState) -> Router {
    // route_layer order: the layer added last runs first, so bearer
    // authentication happens before the placement/misdirection check.
    let object_routes = Router::new()
        .route(
            "/object/:hash",
            get(handlers::get_object)
                .put(handlers::put_object)
                .delete(handlers::delete_object),
        )
        .layer(DefaultBodyLimit::disable())
        .route_layer(middleware::from_fn_with_state(state.clone(), placement::require_primary))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_user_bearer));

    let internal_routes = Router::new()
        .route(
            "/internal/:hash",
            get(handlers::get_object_internal)
                .put(handlers::put_object_internal)
                .delete(handlers::delete_object_internal),
        )
        .layer(DefaultBodyLimit::disable())
        .route_layer(middleware::from_fn_with_state(state.clone(), placement::require_member))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_cluster_bearer));

    Router::new()
        .merge(object_routes)
        .merge(internal_routes)
        .route("/health", get(handlers::health))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}
