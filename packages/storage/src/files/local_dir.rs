use std::fs;
use std::path::PathBuf;

use futures::executor::block_on;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};

use crate::error::StoreError;

/// Directory on the local filesystem that artifacts are written into.
///
/// Backed by an `object_store` [`LocalFileSystem`] rooted at the directory,
/// driven synchronously. The directory is created on first write and writes
/// replace existing objects.
#[derive(Debug, Clone)]
pub struct LocalDir {
    root: PathBuf,
}

impl std::fmt::Display for LocalDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalDir({})", self.root.display())
    }
}

impl LocalDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn store(&self) -> Result<LocalFileSystem, StoreError> {
        // Fails when something other than a directory sits at the root.
        fs::create_dir_all(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        Ok(LocalFileSystem::new_with_prefix(&self.root)?.with_automatic_cleanup(true))
    }

    /// Write `bytes` to `name` and return the file it landed in.
    pub fn put(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let store = self.store()?;
        let location = Path::from(name);
        block_on(store.put(&location, PutPayload::from(bytes.to_vec())))?;
        let path = store.path_to_filesystem(&location)?;
        tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Serialize `value` as JSON into `name`.
    pub fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<PathBuf, StoreError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| StoreError::io(self.root.join(name), std::io::Error::other(e)))?;
        self.put(name, &bytes)
    }
}
