//! In-memory storage backend.
//! Lost on page reload; used when IndexedDB is unavailable and in tests.

use std::cell::RefCell;
use std::collections::BTreeMap;

use async_trait::async_trait;
use copilot_core::ports::StoragePort;
use copilot_types::Result;

#[derive(Default)]
pub struct MemoryStorage {
    data: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait(?Send)]
impl StoragePort for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.borrow().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.data.borrow_mut().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.borrow_mut().remove(key);
        Ok(())
    }

    /// Keys come back sorted.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .data
            .borrow()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
