//! Shared application state handed to every handler and middleware function.

use std::sync::Arc;

use rados_coordinator::Coordinator;
use rados_core::placement::PlacementTable;

use crate::config::Config;

/// Cheaply cloneable: every field is either already an `Arc`-backed handle
/// ([`Coordinator`]) or wrapped in one here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coordinator: Coordinator,
    pub placement_table: Arc<PlacementTable>,
}
