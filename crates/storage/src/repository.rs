use async_trait::async_trait;
use reading_core::{Clock, PushIdGenerator};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::path::TreePath;
use crate::payload::{DecodedPayload, decode_payload};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid upload payload: {0}")]
    Payload(String),

    #[error("backend returned status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Contract of a hierarchical JSON database.
///
/// Absence and `null` are the same thing: reads of missing paths return
/// `None`, and writing `null` removes the value.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Read the value at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached or answers with
    /// something other than JSON.
    async fn get(&self, path: &TreePath) -> Result<Option<Value>, StorageError>;

    /// Replace the value at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write is rejected or cannot be sent.
    async fn set(&self, path: &TreePath, value: Value) -> Result<(), StorageError>;

    /// Apply several writes below `path` in one request. Entry paths are
    /// relative to `path`; either all of them land or none do.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update is rejected or cannot be sent.
    async fn update(&self, path: &TreePath, writes: Vec<(TreePath, Value)>)
    -> Result<(), StorageError>;

    /// Generate a unique, time-ordered child key.
    fn push_key(&self) -> String;
}

/// Contract of a blob store holding session recordings.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a base64 payload (bare or as a `data:` URL) at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Payload` for undecodable payloads, or transport
    /// errors from the backend.
    async fn upload_base64(&self, path: &str, payload: &str) -> Result<(), StorageError>;

    /// URL from which clients can fetch the blob at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if nothing is stored at `path`.
    async fn download_url(&self, path: &str) -> Result<String, StorageError>;
}

//
// ─── IN-MEMORY TREE ────────────────────────────────────────────────────────────
//

/// In-memory tree with the remote database's write semantics: `null` deletes,
/// empty objects disappear, and multi-path updates are atomic.
#[derive(Clone)]
pub struct InMemoryTree {
    root: Arc<Mutex<Value>>,
    push_ids: Arc<PushIdGenerator>,
}

impl InMemoryTree {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            root: Arc::new(Mutex::new(Value::Null)),
            push_ids: Arc::new(PushIdGenerator::new(clock)),
        }
    }

    /// Copy of the whole tree, for assertions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn snapshot(&self) -> Result<Value, StorageError> {
        let guard = self
            .root
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

impl Default for InMemoryTree {
    fn default() -> Self {
        Self::new(Clock::default_clock())
    }
}

#[async_trait]
impl TreeStore for InMemoryTree {
    async fn get(&self, path: &TreePath) -> Result<Option<Value>, StorageError> {
        let guard = self
            .root
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let found = path
            .segments()
            .iter()
            .try_fold(&*guard, |node, segment| node.get(segment));
        Ok(found.filter(|v| !v.is_null()).cloned())
    }

    async fn set(&self, path: &TreePath, value: Value) -> Result<(), StorageError> {
        let mut guard = self
            .root
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        write_value(&mut guard, path.segments(), value);
        Ok(())
    }

    async fn update(
        &self,
        path: &TreePath,
        writes: Vec<(TreePath, Value)>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .root
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for (relative, value) in writes {
            write_value(&mut guard, path.join(&relative).segments(), value);
        }
        Ok(())
    }

    fn push_key(&self) -> String {
        self.push_ids.next_id()
    }
}

fn write_value(root: &mut Value, segments: &[String], value: Value) {
    let value = prune(value);
    if value.is_null() {
        if remove_value(root, segments) {
            *root = Value::Null;
        }
        return;
    }

    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };
    let mut node = root;
    for segment in parents {
        node = object_mut(node)
            .entry(segment.clone())
            .or_insert(Value::Null);
    }
    object_mut(node).insert(last.clone(), value);
}

/// Remove the value at `segments` and prune emptied parents. Returns true
/// when `node` itself is left empty.
fn remove_value(node: &mut Value, segments: &[String]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return true;
    };
    let Value::Object(map) = node else {
        return node.is_null();
    };
    if rest.is_empty() {
        map.remove(first);
    } else if let Some(child) = map.get_mut(first) {
        if remove_value(child, rest) {
            map.remove(first);
        }
    }
    map.is_empty()
}

fn object_mut(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

/// Drop `null` members and objects left empty by that.
fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if pruned.is_empty() {
                Value::Null
            } else {
                Value::Object(pruned)
            }
        }
        other => other,
    }
}

//
// ─── IN-MEMORY BLOBS ───────────────────────────────────────────────────────────
//

pub const MEMORY_URL_PREFIX: &str = "memory://";

/// Blob store kept in process memory; download URLs use the `memory://` scheme.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, DecodedPayload>>>,
}

impl InMemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored blob.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn get(&self, path: &str) -> Result<Option<DecodedPayload>, StorageError> {
        let guard = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(path).cloned())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload_base64(&self, path: &str, payload: &str) -> Result<(), StorageError> {
        let decoded = decode_payload(payload)?;
        let mut guard = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(path.to_owned(), decoded);
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        let guard = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(path) {
            Ok(format!("{MEMORY_URL_PREFIX}{path}"))
        } else {
            Err(StorageError::NotFound)
        }
    }
}

/// Tree and blob backends behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub tree: Arc<dyn TreeStore>,
    pub blobs: Option<Arc<dyn BlobStore>>,
}

impl Storage {
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        let tree: Arc<dyn TreeStore> = Arc::new(InMemoryTree::new(clock));
        let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        Self {
            tree,
            blobs: Some(blobs),
        }
    }
}
