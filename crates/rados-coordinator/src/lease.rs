//! The read lease: an explicit handle for an in-flight read. Its `Drop` impl
//! guarantees the coordinator's reader bookkeeping runs on every exit path,
//! including early return or a panic unwinding through the caller.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rados_core::ContentHash;

use crate::Inner;

/// A lease on a durable object's on-disk path, held for the duration of a read.
pub struct ReadLease {
    pub(crate) inner: Arc<Inner>,
    pub(crate) key: ContentHash,
    pub(crate) path: PathBuf,
    pub(crate) ended: AtomicBool,
}

impl ReadLease {
    /// The on-disk path the caller should stream from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// End the lease early. Equivalent to dropping it, but lets a caller release
    /// the reader slot as soon as the transfer is done rather than waiting for the
    /// value to go out of scope.
    pub fn end(self) {
        // The Drop impl does the work; this just moves `self` to trigger it now.
    }
}

impl Drop for ReadLease {
    fn drop(&mut self) {
        if self.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.finish_read(self.key);
    }
}
