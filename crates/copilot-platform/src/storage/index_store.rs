//! Persisted vector indexes, one JSON value per index in a `StoragePort`.

use std::rc::Rc;

use async_trait::async_trait;
use copilot_core::ports::{IndexStore, StoragePort};
use copilot_core::retrieval::VectorIndex;
use copilot_types::Result;

pub const INDEX_KEY_PREFIX: &str = "index:";

pub struct StorageIndexStore {
    storage: Rc<dyn StoragePort>,
}

impl StorageIndexStore {
    pub fn new(storage: Rc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    fn key(name: &str) -> String {
        format!("{}{}", INDEX_KEY_PREFIX, name)
    }
}

#[async_trait(?Send)]
impl IndexStore for StorageIndexStore {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .storage
            .list_keys(INDEX_KEY_PREFIX)
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(INDEX_KEY_PREFIX).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn load(&self, name: &str) -> Result<Option<VectorIndex>> {
        match self.storage.get(&Self::key(name)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, name: &str, index: &VectorIndex) -> Result<()> {
        let json = serde_json::to_vec(index)?;
        log::debug!("saving index '{}' ({} chunks, {} bytes)", name, index.len(), json.len());
        self.storage.set(&Self::key(name), &json).await
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.storage.get(&Self::key(name)).await?.is_some())
    }
}
