use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, ScrapeError};

/// Persists per-provider browser authentication state as opaque blobs.
///
/// One artifact per provider name. The store never inspects blob contents;
/// encoding and decoding belong to the browser session layer.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn blob_path(&self, provider: &str) -> PathBuf {
        self.dir.join(format!("{}-storage.json", provider))
    }

    /// Loads the persisted state for a provider. Absence is not an error,
    /// and unreadable content is treated the same as absence.
    pub fn load(&self, provider: &str) -> Result<Option<String>> {
        let path = self.blob_path(provider);
        if !path.exists() {
            debug!("no persisted session for provider {}", provider);
            return Ok(None);
        }
        match fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) => {
                debug!("persisted session for {} unreadable, treating as absent: {}", provider, e);
                Ok(None)
            }
        }
    }

    /// Persists the state blob. Only ever invoked right after a verified login.
    pub fn save(&self, provider: &str, blob: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            ScrapeError::StorageError(format!("Failed to create session directory: {}", e))
        })?;
        fs::write(self.blob_path(provider), blob).map_err(|e| {
            ScrapeError::StorageError(format!("Failed to write session for {}: {}", provider, e))
        })?;
        info!("session saved for provider {}", provider);
        Ok(())
    }

    /// Removes the persisted state. Removing a non-existent entry is fine.
    pub fn invalidate(&self, provider: &str) -> Result<()> {
        let path = self.blob_path(provider);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path).map_err(|e| {
            ScrapeError::StorageError(format!("Failed to remove session for {}: {}", provider, e))
        })?;
        info!("session invalidated for provider {}", provider);
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
