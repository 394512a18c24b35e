//! The blob store: one directory holding one file per content hash.
//!
//! Durability is signalled through POSIX file-mode permission bits rather than a
//! separate marker file or journal. A file is *durable* iff its mode is exactly
//! `0o400` (read-only for the owner, nothing for anyone else). Any other mode —
//! in practice `0o600`, written while the content is still being flushed — marks
//! the file as *transient*: present but not yet safe to serve, and removed by the
//! next startup sweep.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use rados_core::{ContentHash, RadosError};

const DURABLE_MODE: u32 = 0o400;
const TRANSIENT_MODE: u32 = 0o600;
const DIR_MODE: u32 = 0o700;

/// Owns one directory of content-addressed blobs.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open (creating if absent) the store at `root`, and sweep transient files left
    /// behind by a previous crash. Fails if the sweep cannot remove every transient
    /// file it finds — the store refuses to open with unresolved transient files.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, RadosError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        fs::set_permissions(&root, fs::Permissions::from_mode(DIR_MODE))?;

        let store = Self { root };
        store.sweep()?;
        Ok(store)
    }

    fn path_for(&self, key: &ContentHash) -> PathBuf {
        self.root.join(key.to_hex())
    }

    fn sweep(&self) -> Result<(), RadosError> {
        let entries = fs::read_dir(&self.root)?;

        let mut first_err: Option<io::Error> = None;
        for entry in entries {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                continue;
            }

            let metadata = entry.metadata()?;
            if is_durable_mode(metadata.permissions().mode()) {
                continue;
            }

            let path = entry.path();
            tracing::info!(path = %path.display(), "removing object that is not marked as durable");
            if let Err(err) = fs::remove_file(&path) {
                first_err.get_or_insert(err);
            }
        }

        match first_err {
            Some(err) => Err(RadosError::Io(err)),
            None => Ok(()),
        }
    }

    /// Does a file exist at this key's path, durable or not?
    pub fn exists(&self, key: &ContentHash) -> Result<bool, RadosError> {
        match fs::metadata(self.path_for(key)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RadosError::Io(e)),
        }
    }

    /// Create the file, write `content`, and mark it durable. Fails with
    /// `AlreadyExists` if a file is already present at the target path, without
    /// touching it. On any failure after the file is created, the partial file is
    /// removed before the error is returned.
    pub fn put(&self, key: &ContentHash, content: &[u8]) -> Result<(), RadosError> {
        let path = self.path_for(key);

        if self.exists(key)? {
            return Err(RadosError::AlreadyExists);
        }

        match self.create_and_mark(&path, content) {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Err(remove_err) = fs::remove_file(&path) {
                    if remove_err.kind() != io::ErrorKind::NotFound {
                        tracing::warn!(
                            path = %path.display(),
                            error = %remove_err,
                            "failed to remove partial object after write failure",
                        );
                    }
                }
                Err(err)
            }
        }
    }

    fn create_and_mark(&self, path: &Path, content: &[u8]) -> Result<(), RadosError> {
        use std::io::Write;

        let mut file = fs::File::create(path)?;
        file.write_all(content)?;
        file.flush()?;
        // The durable mark is set last: a crash before this line leaves a transient
        // file, which the next startup sweep removes.
        file.set_permissions(fs::Permissions::from_mode(DURABLE_MODE))?;
        Ok(())
    }

    /// The on-disk path if a file is present at this key, or `None` if absent.
    pub fn path_if_present(&self, key: &ContentHash) -> Result<Option<PathBuf>, RadosError> {
        if self.exists(key)? {
            Ok(Some(self.path_for(key)))
        } else {
            Ok(None)
        }
    }

    /// Unlink the file. Returns `NotFound` if the OS reports no such entry.
    pub fn delete(&self, key: &ContentHash) -> Result<(), RadosError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RadosError::NotFound),
            Err(e) => Err(RadosError::Io(e)),
        }
    }

    /// Flip the durable mark off, turning the file transient. Used by the lifecycle
    /// coordinator to hide an object immediately while physical removal is deferred
    /// until the last reader exits.
    pub fn unmark(&self, key: &ContentHash) -> Result<(), RadosError> {
        fs::set_permissions(self.path_for(key), fs::Permissions::from_mode(TRANSIENT_MODE))?;
        Ok(())
    }
}

fn is_durable_mode(mode: u32) -> bool {
    // mode() includes file-type bits on some platforms' raw values; mask to the
    // permission bits before comparing.
    (mode & 0o777) == DURABLE_MODE
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(byte: u8) -> ContentHash {
        ContentHash::from_bytes([byte; 32])
    }

    #[test]
    fn put_then_exists_then_read_back() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let k = key(1);

        assert!(!store.exists(&k).unwrap());
        store.put(&k, b"hello").unwrap();
        assert!(store.exists(&k).unwrap());

        let path = store.path_if_present(&k).unwrap().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, DURABLE_MODE);
    }

    #[test]
    fn put_twice_is_already_exists() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let k = key(2);

        store.put(&k, b"one").unwrap();
        let err = store.put(&k, b"two").unwrap_err();
        assert!(matches!(err, RadosError::AlreadyExists));
        // original content must be untouched
        let path = store.path_if_present(&k).unwrap().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"one");
    }

    #[test]
    fn delete_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let err = store.delete(&key(3)).unwrap_err();
        assert!(matches!(err, RadosError::NotFound));
    }

    #[test]
    fn unmark_then_sweep_removes_file() {
        let dir = tempdir().unwrap();
        let k = key(4);
        {
            let store = BlobStore::open(dir.path()).unwrap();
            store.put(&k, b"content").unwrap();
            store.unmark(&k).unwrap();
            assert!(store.exists(&k).unwrap());
        }

        // reopening sweeps transient files left by the previous session
        let store = BlobStore::open(dir.path()).unwrap();
        assert!(!store.exists(&k).unwrap());
    }

    #[test]
    fn startup_sweep_leaves_durable_files_alone() {
        let dir = tempdir().unwrap();
        let k = key(5);
        {
            let store = BlobStore::open(dir.path()).unwrap();
            store.put(&k, b"content").unwrap();
        }

        let store = BlobStore::open(dir.path()).unwrap();
        assert!(store.exists(&k).unwrap());
    }
}
