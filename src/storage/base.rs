use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use super::{file_storage::FileStorage, memory_storage::MemoryStorage};
use crate::config::StorageConfig;
use crate::models::AuthToken;

/// The well-known key the token is persisted under.
pub const TOKEN_KEY: &str = "token";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to {action} token at {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The one place the bearer token lives.
///
/// The session store is the only writer; everything else goes through a
/// [`TokenReader`].
#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn get(&self) -> Result<Option<AuthToken>, StorageError>;
    async fn set(&self, token: &AuthToken) -> Result<(), StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;
    /// Short description for log lines.
    fn describe(&self) -> String;
}

/// Creates a concrete storage implementation based on the StorageConfig.
pub fn create_storage(config: &StorageConfig) -> Arc<dyn TokenStorage> {
    let storage: Arc<dyn TokenStorage> = match config {
        StorageConfig::Memory => Arc::new(MemoryStorage::new()),
        StorageConfig::File(file_config) => {
            let path = file_config
                .path
                .clone()
                .unwrap_or_else(FileStorage::default_path);
            Arc::new(FileStorage::new(path))
        }
    };
    info!(storage = %storage.describe(), "Token storage ready");
    storage
}

/// Read-only view of the token storage, handed to the transport layer.
#[derive(Clone)]
pub struct TokenReader {
    storage: Arc<dyn TokenStorage>,
}

impl TokenReader {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    /// The stored token, if any. A storage failure reads as "no token".
    pub async fn current(&self) -> Option<AuthToken> {
        match self.storage.get().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read stored token; sending request without it");
                None
            }
        }
    }

    /// Drops the stored token. Only for a 401 that arrives after the session
    /// store is gone; while the store is alive it does the clearing.
    pub(crate) async fn discard(&self) {
        if let Err(e) = self.storage.clear().await {
            warn!(error = %e, "Could not clear stored token");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileStorageConfig;

    #[tokio::test]
    async fn test_reader_sees_writes() {
        let storage = create_storage(&StorageConfig::Memory);
        let reader = TokenReader::new(storage.clone());
        assert_eq!(reader.current().await, None);

        let token = AuthToken::new("t1").unwrap();
        storage.set(&token).await.unwrap();
        assert_eq!(reader.current().await, Some(token));

        storage.clear().await.unwrap();
        assert_eq!(reader.current().await, None);
    }

    #[tokio::test]
    async fn test_file_config_uses_given_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(TOKEN_KEY);
        let storage = create_storage(&StorageConfig::File(FileStorageConfig {
            path: Some(path.clone()),
        }));

        storage.set(&AuthToken::new("t1").unwrap()).await.unwrap();
        assert!(path.exists());
        assert!(storage.describe().contains("nested"));
    }
}
