//! The node binary's internals, exposed as a library so integration tests can
//! drive the axum router directly instead of going through a real socket.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod placement;
pub mod router;
pub mod state;
