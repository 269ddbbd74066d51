use std::sync::Arc;
use std::time::Duration;

use reading_core::{Clock, PushIdGenerator};
use reqwest::Client;
use thiserror::Error;
use url::Url;

use crate::repository::{BlobStore, Storage, TreeStore};

mod blob;
mod database;

pub use blob::{CloudStorage, DEFAULT_STORAGE_URL};
pub use database::RealtimeDatabase;

/// Connection settings for the hosted tree database and its blob bucket.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub database_url: Url,
    /// Database secret or ID token, sent as the `auth` query parameter and as
    /// the bearer token for blob requests.
    pub auth_token: Option<String>,
    pub storage: Option<BucketConfig>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub base_url: Url,
    pub bucket: String,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FirebaseInitError {
    #[error(transparent)]
    Client(#[from] reqwest::Error),
}

impl Storage {
    /// Build a `Storage` backed by the hosted database, plus the blob bucket
    /// when one is configured. No request is made until the first operation.
    ///
    /// # Errors
    ///
    /// Returns `FirebaseInitError` if the HTTP client cannot be built.
    pub fn firebase(config: &FirebaseConfig, clock: Clock) -> Result<Self, FirebaseInitError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.timeout)
            .build()?;

        let tree: Arc<dyn TreeStore> = Arc::new(RealtimeDatabase::new(
            client.clone(),
            config.database_url.clone(),
            config.auth_token.clone(),
            Arc::new(PushIdGenerator::new(clock)),
        ));
        let blobs = config.storage.as_ref().map(|bucket| {
            let store: Arc<dyn BlobStore> = Arc::new(CloudStorage::new(
                client.clone(),
                bucket.base_url.clone(),
                bucket.bucket.clone(),
                config.auth_token.clone(),
            ));
            store
        });

        Ok(Self { tree, blobs })
    }
}
