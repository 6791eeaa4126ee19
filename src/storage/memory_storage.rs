use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StorageError, TokenStorage};
use crate::models::AuthToken;

/// Keeps the token for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryStorage {
    token: RwLock<Option<AuthToken>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that starts out holding `token`.
    pub fn with_token(token: AuthToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }
}

#[async_trait]
impl TokenStorage for MemoryStorage {
    async fn get(&self) -> Result<Option<AuthToken>, StorageError> {
        Ok(self.token.read().await.clone())
    }

    async fn set(&self, token: &AuthToken) -> Result<(), StorageError> {
        *self.token.write().await = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.token.write().await = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
