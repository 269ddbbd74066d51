//! Shared error types for the services crate.

use thiserror::Error;

use storage::StorageError;
use storage::firebase::FirebaseInitError;

/// Errors emitted by `SessionStore` operations.
///
/// A disabled store never produces these; they always come from a live
/// backend rejecting or failing a request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionStoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while building a `SessionStore`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreInitError {
    #[error("session store is not configured: {0} is not set")]
    MissingConfig(&'static str),
    #[error("{var} is not a valid URL")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid value for {var}: {value:?}")]
    InvalidSetting { var: &'static str, value: String },
    #[error("blob audio storage requires {0}")]
    MissingBucket(&'static str),
    #[error("invalid root path: {0}")]
    InvalidRoot(#[source] StorageError),
    #[error(transparent)]
    Backend(#[from] FirebaseInitError),
}
