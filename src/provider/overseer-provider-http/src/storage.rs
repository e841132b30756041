//! Session persistence.
//!
//! The HTTP provider keeps the signed-in session between process runs so
//! that `get_current_session` has something to return.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use overseer_identity::Session;
use overseer_provider::ProviderError;

/// Where the current session is kept.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Loads the stored session, if any.
    async fn load(&self) -> Result<Option<Session>, ProviderError>;

    /// Replaces the stored session.
    async fn save(&self, session: &Session) -> Result<(), ProviderError>;

    /// Removes the stored session. Clearing an empty storage is not an error.
    async fn clear(&self) -> Result<(), ProviderError>;
}

/// Session stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    /// Uses the file at `path`; parent directories are created on save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn load(&self) -> Result<Option<Session>, ProviderError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ProviderError::Storage(format!("failed to read session: {e}"))),
        };

        match serde_json::from_slice(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                Ok(None)
            },
        }
    }

    async fn save(&self, session: &Session) -> Result<(), ProviderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ProviderError::Storage(format!("failed to create directory: {e}"))
            })?;
        }

        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| ProviderError::Storage(format!("failed to encode session: {e}")))?;

        // Write then rename: readers never see a partial file.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| ProviderError::Storage(format!("failed to write session: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ProviderError::Storage(format!("failed to write session: {e}")))?;

        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), ProviderError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session cleared");
                Ok(())
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProviderError::Storage(format!("failed to remove session: {e}"))),
        }
    }
}

/// Session kept in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage holding `session`.
    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn load(&self) -> Result<Option<Session>, ProviderError> {
        Ok(self.session.lock().clone())
    }

    async fn save(&self, session: &Session) -> Result<(), ProviderError> {
        *self.session.lock() = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ProviderError> {
        self.session.lock().take();
        Ok(())
    }
}
