#![forbid(unsafe_code)]

pub mod firebase;
pub mod path;
pub mod payload;
pub mod repository;

pub use path::TreePath;
pub use repository::{BlobStore, InMemoryBlobStore, InMemoryTree, Storage, StorageError, TreeStore};
