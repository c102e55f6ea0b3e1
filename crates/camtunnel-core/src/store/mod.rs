// ── Persistence ──
//
// A raw key-value capability plus the typed adapter the rest of the
// crate talks to.

mod file;
mod kv;
mod storage;

pub use file::FileStore;
pub use kv::{KeyValueStore, MemoryStore, StoreError};
pub use storage::{
    ALL_KEYS, APP_SETTINGS_KEY, CAMERAS_KEY, RELAY_CONFIG_KEY, Storage, TUNNEL_STATUS_KEY,
};
