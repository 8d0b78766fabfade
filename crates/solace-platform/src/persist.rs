use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use solace_types::api::TokenGrant;

/// Where the connector keeps the signed-in credential between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Cached in a file and restored on the next connect.
    Durable,
    /// Held only in process memory. Entering this mode wipes the file.
    InMemory,
}

/// File-backed credential cache honoring the persistence mode.
///
/// Cache trouble is never fatal: a sign-in that cannot be persisted still
/// signed in, so failures here are logged and swallowed.
pub struct CredentialCache {
    path: PathBuf,
    mode: Mutex<PersistenceMode>,
}

impl CredentialCache {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            mode: Mutex::new(PersistenceMode::Durable),
        }
    }

    /// Restores a previously persisted grant, if the mode allows one.
    pub async fn load(&self) -> Option<TokenGrant> {
        if *self.mode.lock().await == PersistenceMode::InMemory {
            return None;
        }
        let raw = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(grant) => Some(grant),
            Err(err) => {
                warn!("Discarding unreadable credential cache: {err}");
                None
            }
        }
    }

    pub async fn persist(&self, grant: &TokenGrant) {
        if *self.mode.lock().await == PersistenceMode::InMemory {
            return;
        }
        match serde_json::to_string(grant) {
            Ok(raw) => {
                if let Err(err) = tokio::fs::write(&self.path, raw).await {
                    warn!("Could not persist credential cache: {err}");
                }
            }
            Err(err) => warn!("Could not encode credential cache: {err}"),
        }
    }

    /// Switches mode. Entering `InMemory` deletes any on-disk grant so a
    /// later run starts signed out.
    pub async fn set_mode(&self, mode: PersistenceMode) {
        *self.mode.lock().await = mode;
        if mode == PersistenceMode::InMemory {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => debug!("Cleared durable credential cache"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!("Could not clear credential cache: {err}"),
            }
        }
    }
}
