pub mod auto;
pub mod index_store;
pub mod indexeddb;
pub mod memory;

pub use auto::open_storage;
pub use index_store::StorageIndexStore;
pub use indexeddb::IndexedDbStorage;
pub use memory::MemoryStorage;
