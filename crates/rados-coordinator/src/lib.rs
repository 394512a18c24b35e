//! The lifecycle coordinator: a single per-node state table that sequences create,
//! read, and delete for each content hash, mediates between the blob store and the
//! replication client, and enforces at-most-one-writer / many-readers /
//! delayed-delete semantics.
//!
//! The table's mutex protects only in-memory state transitions; it is never held
//! across a blob-store or replication call. Those calls run through
//! `tokio::task::spawn_blocking` (blob store) or as ordinary `async` calls
//! (replication), so a slow disk or an unresponsive peer never blocks unrelated
//! keys.

mod lease;
mod state;

pub use lease::ReadLease;
pub use state::DeleteState;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use rados_core::{ContentHash, RadosError};
use rados_replication::ReplicationClient;
use rados_storage::BlobStore;

use state::{get_state, set_state, KeyState};

pub(crate) struct Inner {
    table: Mutex<HashMap<ContentHash, KeyState>>,
    blob_store: Arc<BlobStore>,
    replication: Arc<ReplicationClient>,
}

/// Cheaply cloneable handle to the lifecycle engine for one node.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(blob_store: Arc<BlobStore>, replication: Arc<ReplicationClient>) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(HashMap::new()),
                blob_store,
                replication,
            }),
        }
    }

    /// Operation `write`: admit a new object, replicate it (if this node is the
    /// primary), and persist it locally.
    pub async fn write(
        &self,
        key: ContentHash,
        bytes: Vec<u8>,
        is_primary: bool,
        peers: &[String],
    ) -> Result<(), RadosError> {
        {
            let mut table = self.inner.table.lock();
            let state = get_state(&table, &key);
            if state.want_create || state.creating || state.readers > 0 || state.deleting != DeleteState::None {
                return Err(RadosError::AlreadyExists);
            }
            let mut state = state;
            state.want_create = true;
            set_state(&mut table, key, state);
        }

        match self.inner.blob_exists(key).await {
            Ok(true) => {
                self.clear_want_create(key);
                return Err(RadosError::AlreadyExists);
            }
            Ok(false) => {}
            Err(err) => {
                self.clear_want_create(key);
                return Err(err);
            }
        }

        {
            let mut table = self.inner.table.lock();
            let mut state = get_state(&table, &key);
            if state.creating || state.deleting != DeleteState::None {
                state.want_create = false;
                set_state(&mut table, key, state);
                return Err(RadosError::AlreadyExists);
            }
            state.want_create = false;
            state.creating = true;
            set_state(&mut table, key, state);
        }

        if is_primary {
            if let Err(err) = self.inner.replication.replicate(&key, &bytes, peers).await {
                self.clear_creating(key);
                return Err(RadosError::Replication(err));
            }
        }

        if let Err(err) = self.inner.blob_put(key, bytes).await {
            if is_primary {
                if let Err(delete_err) = self.inner.replication.delete(&key, peers).await {
                    tracing::error!(
                        object_hash = %key,
                        error = %delete_err,
                        "failed to roll back replicas after local write failure",
                    );
                }
            }
            self.clear_creating(key);
            return Err(err);
        }

        self.clear_creating(key);
        Ok(())
    }

    /// Operation `read`: admit a reader and hand back a lease over the object's
    /// on-disk path.
    pub async fn read(&self, key: ContentHash) -> Result<ReadLease, RadosError> {
        {
            let table = self.inner.table.lock();
            let state = get_state(&table, &key);
            if state.creating || state.deleting != DeleteState::None {
                return Err(RadosError::NotFound);
            }
        }

        let exists = self.inner.blob_exists(key).await?;

        {
            let mut table = self.inner.table.lock();
            let state = get_state(&table, &key);
            if state.creating || state.deleting != DeleteState::None {
                return Err(RadosError::NotFound);
            }
            if !exists {
                return Err(RadosError::NotFound);
            }
            let mut state = state;
            state.readers += 1;
            set_state(&mut table, key, state);
        }

        let path = self.inner.blob_path_if_present(key).await?;
        let path = match path {
            Some(path) => path,
            None => {
                // a delete raced in between the existence check and now
                self.inner.finish_read(key);
                return Err(RadosError::NotFound);
            }
        };

        Ok(ReadLease {
            inner: self.inner.clone(),
            key,
            path,
            ended: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Operation `delete`: admit a delete, deferring the physical removal if
    /// readers are active.
    pub async fn delete(
        &self,
        key: ContentHash,
        is_primary: bool,
        peers: &[String],
    ) -> Result<(), RadosError> {
        {
            let mut table = self.inner.table.lock();
            let state = get_state(&table, &key);
            if state.deleting != DeleteState::None || state.want_delete {
                return Err(RadosError::NotFound);
            }
            let mut state = state;
            state.want_delete = true;
            set_state(&mut table, key, state);
        }

        match self.inner.blob_exists(key).await {
            Ok(true) => {}
            Ok(false) => {
                self.clear_want_delete(key);
                return Err(RadosError::NotFound);
            }
            Err(err) => {
                self.clear_want_delete(key);
                return Err(err);
            }
        }

        let readers_pending = {
            let mut table = self.inner.table.lock();
            let mut state = get_state(&table, &key);
            if state.creating || state.deleting != DeleteState::None {
                state.want_delete = false;
                set_state(&mut table, key, state);
                return Err(RadosError::NotFound);
            }
            state.want_delete = false;
            state.deleting = DeleteState::Pending;
            let readers_pending = state.readers > 0;
            set_state(&mut table, key, state);
            readers_pending
        };

        if readers_pending {
            if let Err(err) = self.inner.blob_unmark(key).await {
                let mut table = self.inner.table.lock();
                let mut state = get_state(&table, &key);
                state.deleting = DeleteState::None;
                set_state(&mut table, key, state);
                return Err(err);
            }
            // the user sees success now; physical removal happens when the last
            // reader's lease is dropped, via Inner::run_deferred_delete
            return Ok(());
        }

        if is_primary {
            if let Err(err) = self.inner.replication.delete(&key, peers).await {
                tracing::error!(
                    object_hash = %key,
                    error = %err,
                    "failed to delete replicated copies of object",
                );
            }
        }

        let result = self.inner.blob_delete(key).await;
        {
            let mut table = self.inner.table.lock();
            let mut state = get_state(&table, &key);
            state.deleting = DeleteState::None;
            set_state(&mut table, key, state);
        }

        match result {
            Ok(()) => Ok(()),
            Err(RadosError::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn clear_want_create(&self, key: ContentHash) {
        let mut table = self.inner.table.lock();
        let mut state = get_state(&table, &key);
        state.want_create = false;
        set_state(&mut table, key, state);
    }

    fn clear_creating(&self, key: ContentHash) {
        let mut table = self.inner.table.lock();
        let mut state = get_state(&table, &key);
        state.creating = false;
        set_state(&mut table, key, state);
    }

    fn clear_want_delete(&self, key: ContentHash) {
        let mut table = self.inner.table.lock();
        let mut state = get_state(&table, &key);
        state.want_delete = false;
        set_state(&mut table, key, state);
    }

    /// Current in-flight reader count for a key. Exposed for tests exercising
    /// concurrency behavior; not part of the public operational surface.
    #[doc(hidden)]
    pub fn reader_count(&self, key: ContentHash) -> u32 {
        let table = self.inner.table.lock();
        get_state(&table, &key).readers
    }
}

impl Inner {
    async fn blob_exists(&self, key: ContentHash) -> Result<bool, RadosError> {
        let store = self.blob_store.clone();
        tokio::task::spawn_blocking(move || store.exists(&key))
            .await
            .expect("blob store task panicked")
    }

    async fn blob_put(&self, key: ContentHash, bytes: Vec<u8>) -> Result<(), RadosError> {
        let store = self.blob_store.clone();
        tokio::task::spawn_blocking(move || store.put(&key, &bytes))
            .await
            .expect("blob store task panicked")
    }

    async fn blob_delete(&self, key: ContentHash) -> Result<(), RadosError> {
        let store = self.blob_store.clone();
        tokio::task::spawn_blocking(move || store.delete(&key))
            .await
            .expect("blob store task panicked")
    }

    async fn blob_unmark(&self, key: ContentHash) -> Result<(), RadosError> {
        let store = self.blob_store.clone();
        tokio::task::spawn_blocking(move || store.unmark(&key))
            .await
            .expect("blob store task panicked")
    }

    async fn blob_path_if_present(&self, key: ContentHash) -> Result<Option<PathBuf>, RadosError> {
        let store = self.blob_store.clone();
        tokio::task::spawn_blocking(move || store.path_if_present(&key))
            .await
            .expect("blob store task panicked")
    }

    /// Called when a read lease is dropped: decrement the reader count and, if
    /// this was the last reader and a delete is pending, spawn the deferred
    /// physical removal.
    pub(crate) fn finish_read(self: &Arc<Self>, key: ContentHash) {
        let trigger = {
            let mut table = self.table.lock();
            let mut state = get_state(&table, &key);
            if state.readers > 0 {
                state.readers -= 1;
            } else {
                tracing::warn!(object_hash = %key, "reader count underflow; treating as zero");
            }
            let trigger = state.readers == 0 && state.deleting == DeleteState::Pending;
            set_state(&mut table, key, state);
            trigger
        };

        if trigger {
            let inner = self.clone();
            tokio::spawn(async move {
                inner.run_deferred_delete(key).await;
            });
        }
    }

    async fn run_deferred_delete(self: Arc<Self>, key: ContentHash) {
        if let Err(err) = self.blob_delete(key).await {
            if !matches!(err, RadosError::NotFound) {
                tracing::error!(
                    object_hash = %key,
                    error = %err,
                    "deferred delete failed to remove object after last reader exited",
                );
            }
        }

        let mut table = self.table.lock();
        let mut state = get_state(&table, &key);
        state.deleting = DeleteState::None;
        set_state(&mut table, key, state);
    }
}
