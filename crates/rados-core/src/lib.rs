//! Core types shared across the object store: the content hash key, the error
//! taxonomy, and the placement function.

pub mod error;
pub mod placement;
pub mod types;

pub use error::RadosError;
pub use placement::{Placement, PlacementGroup, PlacementTable};
pub use types::ContentHash;

/// Validate a candidate key string: exactly 64 characters, every character a
/// lowercase hex digit. This is the single validator used by the request layer, the
/// placement function's caller, and the blob store's defence-in-depth check before path
/// construction.
pub fn validate(s: &str) -> Result<ContentHash, RadosError> {
    ContentHash::from_hex(s)
}

pub mod prelude {
    pub use crate::error::RadosError;
    pub use crate::placement::{Placement, PlacementGroup, PlacementTable};
    pub use crate::types::ContentHash;
    pub use crate::validate;
}
