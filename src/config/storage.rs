use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the bearer token lives between runs. We differentiate the backends
/// via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Token is lost when the process exits.
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "file")]
    File(FileStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File(FileStorageConfig::default())
    }
}

/// File-backed storage. Without a path the token goes to the platform's
/// local data directory.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct FileStorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}
