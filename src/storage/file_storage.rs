use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{StorageError, TokenStorage, TOKEN_KEY};
use crate::models::AuthToken;

/// Persists the token in a single file so a session survives restarts.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<local data dir>/studio-session/token`, or `./token` when the
    /// platform has no data directory.
    pub fn default_path() -> PathBuf {
        match dirs::data_local_dir() {
            Some(dir) => dir.join("studio-session").join(TOKEN_KEY),
            None => PathBuf::from(TOKEN_KEY),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, action: &'static str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            action,
            path: self.path.clone(),
            source,
        }
    }

    #[cfg(unix)]
    async fn restrict_permissions(&self, path: &Path) -> Result<(), StorageError> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| self.io_error("protect", e))
    }

    #[cfg(not(unix))]
    async fn restrict_permissions(&self, _path: &Path) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for FileStorage {
    async fn get(&self) -> Result<Option<AuthToken>, StorageError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => match AuthToken::new(contents) {
                Ok(token) => Ok(Some(token)),
                Err(_) => {
                    warn!(path = %self.path.display(), "Token file is empty; ignoring it");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error("read", e)),
        }
    }

    async fn set(&self, token: &AuthToken) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error("create directory for", e))?;
        }

        // Write next to the target and rename, so readers never see half a token.
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, token.as_str())
            .await
            .map_err(|e| self.io_error("write", e))?;
        self.restrict_permissions(&staging).await?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| self.io_error("replace", e))?;

        debug!(path = %self.path.display(), "Token persisted");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Token removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error("remove", e)),
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
