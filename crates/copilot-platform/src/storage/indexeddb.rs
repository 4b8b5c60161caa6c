//! IndexedDB storage backend.
//! Survives page reloads; holds the saved config and every built index.

use async_trait::async_trait;
use js_sys::{Array, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{IdbDatabase, IdbObjectStore, IdbRequest, IdbTransactionMode};

use copilot_core::ports::StoragePort;
use copilot_types::{CopilotError, Result};

const DB_NAME: &str = "copilot_storage";
const STORE_NAME: &str = "kv";
const DB_VERSION: u32 = 1;

fn storage_err(e: JsValue) -> CopilotError {
    CopilotError::Storage(format!("{:?}", e))
}

pub struct IndexedDbStorage {
    db: IdbDatabase,
}

impl IndexedDbStorage {
    /// Open (or create) the database.
    pub async fn open() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| CopilotError::Storage("No window object".to_string()))?;

        let factory = window
            .indexed_db()
            .map_err(storage_err)?
            .ok_or_else(|| CopilotError::Storage("IndexedDB not available".to_string()))?;

        let open_req = factory
            .open_with_u32(DB_NAME, DB_VERSION)
            .map_err(storage_err)?;

        let upgrade_req = open_req.clone();
        let onupgrade = Closure::once(move |_event: web_sys::Event| {
            let db = upgrade_req
                .result()
                .ok()
                .and_then(|r| r.dyn_into::<IdbDatabase>().ok());
            match db {
                Some(db) if !db.object_store_names().contains(STORE_NAME) => {
                    if let Err(e) = db.create_object_store(STORE_NAME) {
                        log::error!("cannot create object store: {:?}", e);
                    }
                }
                Some(_) => {}
                None => log::error!("upgrade fired without a database"),
            }
        });
        open_req.set_onupgradeneeded(Some(onupgrade.as_ref().unchecked_ref()));
        onupgrade.forget();

        let db: IdbDatabase = JsFuture::from(request_promise(&open_req))
            .await
            .map_err(storage_err)?
            .dyn_into()
            .map_err(storage_err)?;

        Ok(Self { db })
    }

    fn store(&self, mode: IdbTransactionMode) -> Result<IdbObjectStore> {
        let tx = self
            .db
            .transaction_with_str_and_mode(STORE_NAME, mode)
            .map_err(storage_err)?;
        tx.object_store(STORE_NAME).map_err(storage_err)
    }
}

#[async_trait(?Send)]
impl StoragePort for IndexedDbStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let req = self
            .store(IdbTransactionMode::Readonly)?
            .get(&JsValue::from_str(key))
            .map_err(storage_err)?;
        let result = JsFuture::from(request_promise(&req))
            .await
            .map_err(storage_err)?;

        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }
        Ok(Some(Uint8Array::new(&result).to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let req = self
            .store(IdbTransactionMode::Readwrite)?
            .put_with_key(&Uint8Array::from(value), &JsValue::from_str(key))
            .map_err(storage_err)?;
        JsFuture::from(request_promise(&req))
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let req = self
            .store(IdbTransactionMode::Readwrite)?
            .delete(&JsValue::from_str(key))
            .map_err(storage_err)?;
        JsFuture::from(request_promise(&req))
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let req = self
            .store(IdbTransactionMode::Readonly)?
            .get_all_keys()
            .map_err(storage_err)?;
        let result = JsFuture::from(request_promise(&req))
            .await
            .map_err(storage_err)?;
        let array: Array = result.dyn_into().map_err(storage_err)?;

        Ok(array
            .iter()
            .filter_map(|k| k.as_string())
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    fn backend_name(&self) -> &str {
        "indexeddb"
    }
}

/// Wrap the callback-style request in a Promise so it can be awaited.
fn request_promise(req: &IdbRequest) -> js_sys::Promise {
    let req = req.clone();
    js_sys::Promise::new(&mut move |resolve, reject| {
        let done_req = req.clone();
        let onsuccess = Closure::once(move |_: web_sys::Event| {
            let _ = resolve.call1(
                &JsValue::NULL,
                &done_req.result().unwrap_or(JsValue::UNDEFINED),
            );
        });
        let onerror = Closure::once(move |_: web_sys::Event| {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("IDB request failed"));
        });
        req.set_onsuccess(Some(onsuccess.as_ref().unchecked_ref()));
        req.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onsuccess.forget();
        onerror.forget();
    })
}
