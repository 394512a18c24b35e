//! Entry point: load configuration, guard the persisted cluster identity, open
//! the blob store, and serve the HTTP surface until a shutdown signal arrives.

use std::sync::Arc;

use rados_coordinator::Coordinator;
use rados_core::placement::PlacementTable;
use rados_node::{config, router, state::AppState};
use rados_replication::ReplicationClient;
use rados_storage::BlobStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    init_tracing(cfg.use_production_logger);

    config::guard_persisted_configuration(&cfg)?;

    if cfg.user_bearer_token.is_empty() {
        tracing::warn!("no user bearer token configured; /object endpoints accept unauthenticated requests");
    }
    if cfg.cluster_bearer_token.is_empty() {
        tracing::warn!("no cluster bearer token configured; /internal endpoints accept unauthenticated requests");
    }

    let blob_store = Arc::new(BlobStore::open(&cfg.object_folder)?);
    let replication_token = (!cfg.cluster_bearer_token.is_empty()).then(|| cfg.cluster_bearer_token.clone());
    let replication = Arc::new(ReplicationClient::new(replication_token));
    let coordinator = Coordinator::new(blob_store, replication);

    let placement_table = Arc::new(PlacementTable {
        node_hosts: cfg.node_hosts.clone(),
        placement_groups: cfg.placement_groups.clone(),
    });

    let addr = format!("0.0.0.0:{}", cfg.port);
    let state = AppState {
        config: Arc::new(cfg),
        coordinator,
        placement_table,
    };

    let app = router::build_router(state);

    tracing::info!(address = %addr, "starting rados-node");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(use_production_logger: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if use_production_logger {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, shutting down gracefully");
}
