//! End-to-end HTTP surface tests, driving the axum router directly (no real
//! socket) via `tower::ServiceExt::oneshot`. Exercises the request-layer
//! concerns that sit above the coordinator: bearer auth, misdirection,
//! multipart parsing, and size limits.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rados_coordinator::Coordinator;
use rados_core::placement::PlacementTable;
use rados_node::config::Config;
use rados_node::router::build_router;
use rados_node::state::AppState;
use rados_replication::ReplicationClient;
use rados_storage::BlobStore;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tower::ServiceExt;

const KEY_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

fn config(node_id: u32, node_hosts: Vec<String>, placement_groups: Vec<Vec<u32>>, object_folder: std::path::PathBuf) -> Config {
    Config {
        port: 0,
        user_bearer_token: "user-token".into(),
        cluster_bearer_token: "cluster-token".into(),
        max_object_size_bytes: 16,
        object_folder,
        node_id,
        node_hosts,
        placement_groups,
        use_production_logger: false,
    }
}

fn state(dir: &TempDir, node_id: u32) -> AppState {
    let cfg = config(
        node_id,
        vec!["node0:5000".into()],
        vec![vec![0]],
        dir.path().to_path_buf(),
    );
    let blob_store = Arc::new(BlobStore::open(&cfg.object_folder).unwrap());
    let replication = Arc::new(ReplicationClient::new(None));
    let coordinator = Coordinator::new(blob_store, replication);
    let placement_table = Arc::new(PlacementTable {
        node_hosts: cfg.node_hosts.clone(),
        placement_groups: cfg.placement_groups.clone(),
    });
    AppState {
        config: Arc::new(cfg),
        coordinator,
        placement_table,
    }
}

fn multipart_body(field_name: &str, content: &[u8]) -> (String, Vec<u8>) {
    let boundary = "RadosTestBoundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field_name}\"; filename=\"blob\"\r\n").as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

fn put_request(hash: &str, bearer: Option<&str>, content: &[u8]) -> Request<Body> {
    let (content_type, body) = multipart_body("file", content);
    let mut builder = Request::builder()
        .method("PUT")
        .uri(format!("/object/{hash}"))
        .header("content-type", content_type);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

fn get_request(hash: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(format!("/object/{hash}"));
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn delete_request(hash: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(format!("/object/{hash}"));
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// A real client addresses content by its SHA-256 digest; the engine itself never
/// computes one (it trusts the caller), but this is what that caller's key looks
/// like in practice, as opposed to the fixed `KEY_A` fixture used elsewhere.
#[tokio::test]
async fn write_then_read_by_real_sha256_digest() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir, 0));

    let content = b"hello, world";
    let digest = Sha256::digest(content);
    let hash = hex::encode(digest);

    let response = app
        .clone()
        .oneshot(put_request(&hash, Some("user-token"), content))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request(&hash, Some("user-token"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], &content[..]);
}

#[tokio::test]
async fn happy_write_then_read() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir, 0));

    let response = app
        .clone()
        .oneshot(put_request(KEY_A, Some("user-token"), b"hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request(KEY_A, Some("user-token"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"hello");
}

#[tokio::test]
async fn missing_bearer_is_unauthorized() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir, 0));

    let response = app.oneshot(get_request(KEY_A, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_bearer_is_unauthorized() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir, 0));

    let response = app.oneshot(get_request(KEY_A, Some("not-it"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_hash_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir, 0));

    let response = app
        .oneshot(get_request("not-a-valid-hash", Some("user-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_node_put_is_misdirected() {
    let dir = TempDir::new().unwrap();
    // this node (id 1) is not the primary of the single placement group [0]
    let app = build_router(state(&dir, 1));

    let response = app
        .oneshot(put_request(KEY_A, Some("user-token"), b"hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::MISDIRECTED_REQUEST);
}

#[tokio::test]
async fn oversized_object_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir, 0));

    let response = app
        .oneshot(put_request(KEY_A, Some("user-token"), &[0u8; 64]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn missing_form_file_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir, 0));

    let (content_type, body) = multipart_body("not-file", b"hello");
    let request = Request::builder()
        .method("PUT")
        .uri(format!("/object/{KEY_A}"))
        .header("authorization", "Bearer user-token")
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn write_then_delete_then_read_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir, 0));

    app.clone()
        .oneshot(put_request(KEY_A, Some("user-token"), b"hello"))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(delete_request(KEY_A, Some("user-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request(KEY_A, Some("user-token"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn second_concurrent_write_loses_with_conflict() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir, 0));

    let r1 = app.clone().oneshot(put_request(KEY_A, Some("user-token"), b"one"));
    let r2 = app.oneshot(put_request(KEY_A, Some("user-token"), b"two"));
    let (r1, r2) = tokio::join!(r1, r2);

    let statuses = [r1.unwrap().status(), r2.unwrap().status()];
    assert!(statuses.contains(&StatusCode::OK));
    assert!(statuses.contains(&StatusCode::CONFLICT));
}

#[tokio::test]
async fn health_check_does_not_require_auth() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir, 0));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
