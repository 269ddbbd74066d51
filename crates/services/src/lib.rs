#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod session_store;

pub use reading_core::Clock;

pub use config::{AudioMode, StoreConfig, StoreSettings};
pub use error::{SessionStoreError, StoreInitError};
pub use session_store::SessionStore;
