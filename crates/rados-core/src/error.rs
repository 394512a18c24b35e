//! Error taxonomy surfaced by the core.

use thiserror::Error;

/// The fixed set of errors the lifecycle engine and its collaborators can produce.
#[derive(Error, Debug)]
pub enum RadosError {
    #[error("key did not validate as a 64-character lowercase hex content hash")]
    InvalidKey,

    #[error("object not found")]
    NotFound,

    #[error("object already exists")]
    AlreadyExists,

    #[error("object exceeds the configured maximum size")]
    TooLarge,

    #[error("request reached the wrong node for placement group {pg_index}; primary is {primary_host}")]
    Misdirected {
        pg_index: u32,
        primary_host: String,
    },

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("replication failure: {0}")]
    Replication(String),
}

impl RadosError {
    /// Machine-readable identifier, stable across releases, used in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RadosError::InvalidKey => "invalid_key",
            RadosError::NotFound => "not_found",
            RadosError::AlreadyExists => "already_exists",
            RadosError::TooLarge => "too_large",
            RadosError::Misdirected { .. } => "misdirected",
            RadosError::Io(_) => "io_error",
            RadosError::Replication(_) => "replication_error",
        }
    }

    /// HTTP status code this error maps to, per the external interface contract.
    pub fn status_code(&self) -> u16 {
        match self {
            RadosError::InvalidKey => 400,
            RadosError::NotFound => 404,
            RadosError::AlreadyExists => 409,
            RadosError::TooLarge => 413,
            RadosError::Misdirected { .. } => 421,
            RadosError::Io(_) => 500,
            RadosError::Replication(_) => 500,
        }
    }
}
