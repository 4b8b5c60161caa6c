//! Persist `CopilotConfig` as JSON through a `StoragePort`.

use copilot_types::{Result, config::CopilotConfig};

use crate::ports::StoragePort;

pub const CONFIG_STORAGE_KEY: &str = "copilot:config";

/// Stored config, or `None` when nothing was saved yet.
pub async fn load_config(storage: &dyn StoragePort) -> Result<Option<CopilotConfig>> {
    match storage.get(CONFIG_STORAGE_KEY).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub async fn save_config(storage: &dyn StoragePort, config: &CopilotConfig) -> Result<()> {
    let json = serde_json::to_vec(config)?;
    storage.set(CONFIG_STORAGE_KEY, &json).await
}
