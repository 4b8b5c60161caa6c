//! Backend selection from `StorageConfig`.

use std::rc::Rc;

use copilot_core::ports::StoragePort;
use copilot_types::{config::StorageBackendType, Result};

use super::{IndexedDbStorage, MemoryStorage};

/// Open the configured backend. `Auto` prefers IndexedDB and falls back to
/// memory when the browser refuses it.
pub async fn open_storage(backend: &StorageBackendType) -> Result<Rc<dyn StoragePort>> {
    match backend {
        StorageBackendType::Memory => Ok(Rc::new(MemoryStorage::new())),
        StorageBackendType::IndexedDb => Ok(Rc::new(IndexedDbStorage::open().await?)),
        StorageBackendType::Auto => match IndexedDbStorage::open().await {
            Ok(idb) => {
                log::info!("Storage backend: IndexedDB");
                Ok(Rc::new(idb))
            }
            Err(e) => {
                log::warn!("IndexedDB unavailable ({}), falling back to memory", e);
                Ok(Rc::new(MemoryStorage::new()))
            }
        },
    }
}
