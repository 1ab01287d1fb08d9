//! Durable slot for the role a user declared before the OAuth redirect.
//!
//! The identity provider's round trip leaves the application, so the
//! declared role must outlive in-memory state. This is the only client-side
//! state that is persisted.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::state::UserType;
use crate::error::StagingError;

/// Single-key store for the intended role.
#[async_trait]
pub trait RoleStaging: Send + Sync {
    /// Write the intended role, replacing any previous value.
    async fn stage(&self, role: UserType) -> Result<(), StagingError>;

    /// Read the intended role without consuming it.
    async fn peek(&self) -> Result<Option<UserType>, StagingError>;

    /// Read and delete the intended role.
    async fn take(&self) -> Result<Option<UserType>, StagingError>;

    /// Delete the intended role if present.
    async fn clear(&self) -> Result<(), StagingError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StagedRole {
    intended_role: UserType,
}

/// Staging slot persisted as a small JSON file.
pub struct FileRoleStaging {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRoleStaging {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<Option<UserType>, StagingError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StagingError::Io(format!("{}: {e}", self.path.display()))),
        };

        match serde_json::from_slice::<StagedRole>(&bytes) {
            Ok(staged) => Ok(Some(staged.intended_role)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable staged role");
                self.remove().await?;
                Err(StagingError::Corrupt(e.to_string()))
            }
        }
    }

    async fn remove(&self) -> Result<(), StagingError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StagingError::Io(format!("{}: {e}", self.path.display()))),
        }
    }
}

#[async_trait]
impl RoleStaging for FileRoleStaging {
    async fn stage(&self, role: UserType) -> Result<(), StagingError> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StagingError::Io(format!("{}: {e}", parent.display())))?;
        }
        let body = serde_json::to_vec(&StagedRole {
            intended_role: role,
        })
        .map_err(|e| StagingError::Corrupt(e.to_string()))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| StagingError::Io(format!("{}: {e}", self.path.display())))?;
        debug!(role = %role, "Intended role staged");
        Ok(())
    }

    async fn peek(&self) -> Result<Option<UserType>, StagingError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn take(&self) -> Result<Option<UserType>, StagingError> {
        let _guard = self.lock.lock().await;
        let role = self.read().await?;
        if role.is_some() {
            self.remove().await?;
        }
        Ok(role)
    }

    async fn clear(&self) -> Result<(), StagingError> {
        let _guard = self.lock.lock().await;
        self.remove().await
    }
}

/// In-memory staging slot.
#[derive(Default)]
pub struct MemoryRoleStaging {
    slot: Mutex<Option<UserType>>,
}

impl MemoryRoleStaging {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStaging for MemoryRoleStaging {
    async fn stage(&self, role: UserType) -> Result<(), StagingError> {
        *self.slot.lock().await = Some(role);
        Ok(())
    }

    async fn peek(&self) -> Result<Option<UserType>, StagingError> {
        Ok(*self.slot.lock().await)
    }

    async fn take(&self) -> Result<Option<UserType>, StagingError> {
        Ok(self.slot.lock().await.take())
    }

    async fn clear(&self) -> Result<(), StagingError> {
        *self.slot.lock().await = None;
        Ok(())
    }
}
