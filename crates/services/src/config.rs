use std::env;
use std::time::Duration;

use storage::firebase::{BucketConfig, DEFAULT_STORAGE_URL, FirebaseConfig};
use url::Url;

use crate::error::StoreInitError;

pub const ENV_DB_URL: &str = "READING_DB_URL";
pub const ENV_DB_AUTH: &str = "READING_DB_AUTH";
pub const ENV_DB_ROOT: &str = "READING_DB_ROOT";
pub const ENV_AUDIO_MODE: &str = "READING_AUDIO_MODE";
pub const ENV_AUDIO_FOLDER: &str = "READING_AUDIO_FOLDER";
pub const ENV_STORAGE_BUCKET: &str = "READING_STORAGE_BUCKET";
pub const ENV_STORAGE_URL: &str = "READING_STORAGE_URL";
pub const ENV_HTTP_TIMEOUT: &str = "READING_HTTP_TIMEOUT_SECS";

pub const DEFAULT_ROOT: &str = "/readingSessionsV2";
pub const DEFAULT_AUDIO_FOLDER: &str = "audio";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How session recordings are persisted. Fixed per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioMode {
    /// Keep the encoded payload inside the session record.
    Inline,
    /// Upload to `<folder>/<studentKey>/<sessionId>` in the blob store and
    /// keep only the download URL.
    Blob { folder: String },
}

/// Backend-independent settings of a `SessionStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Database path all records live under.
    pub root: String,
    pub audio: AudioMode,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.into(),
            audio: AudioMode::Inline,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: Url,
    pub auth_token: Option<String>,
    pub settings: StoreSettings,
    pub storage_url: Url,
    pub storage_bucket: Option<String>,
    pub timeout: Duration,
}

impl StoreConfig {
    /// Read configuration from `READING_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `StoreInitError::MissingConfig` when `READING_DB_URL` is unset,
    /// or a parse error for malformed values.
    pub fn from_env() -> Result<Self, StoreInitError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`StoreConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StoreInitError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let database_url = var(ENV_DB_URL).ok_or(StoreInitError::MissingConfig(ENV_DB_URL))?;
        let database_url = parse_url(ENV_DB_URL, &database_url)?;
        let storage_url = match var(ENV_STORAGE_URL) {
            Some(raw) => parse_url(ENV_STORAGE_URL, &raw)?,
            None => parse_url(ENV_STORAGE_URL, DEFAULT_STORAGE_URL)?,
        };

        let audio = match var(ENV_AUDIO_MODE).map(|m| m.to_ascii_lowercase()).as_deref() {
            None | Some("inline") => AudioMode::Inline,
            Some("blob") => AudioMode::Blob {
                folder: var(ENV_AUDIO_FOLDER).unwrap_or_else(|| DEFAULT_AUDIO_FOLDER.into()),
            },
            Some(other) => {
                return Err(StoreInitError::InvalidSetting {
                    var: ENV_AUDIO_MODE,
                    value: other.to_owned(),
                });
            }
        };

        let timeout = match var(ENV_HTTP_TIMEOUT) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| StoreInitError::InvalidSetting {
                    var: ENV_HTTP_TIMEOUT,
                    value: raw,
                })?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            database_url,
            auth_token: var(ENV_DB_AUTH),
            settings: StoreSettings {
                root: var(ENV_DB_ROOT).unwrap_or_else(|| DEFAULT_ROOT.into()),
                audio,
            },
            storage_url,
            storage_bucket: var(ENV_STORAGE_BUCKET),
            timeout,
        })
    }

    /// Adapter settings for the hosted backend.
    ///
    /// # Errors
    ///
    /// Returns `StoreInitError::MissingBucket` when blob audio is selected
    /// without a bucket.
    pub fn firebase(&self) -> Result<FirebaseConfig, StoreInitError> {
        let storage = self.storage_bucket.as_ref().map(|bucket| BucketConfig {
            base_url: self.storage_url.clone(),
            bucket: bucket.clone(),
        });
        if matches!(self.settings.audio, AudioMode::Blob { .. }) && storage.is_none() {
            return Err(StoreInitError::MissingBucket(ENV_STORAGE_BUCKET));
        }
        Ok(FirebaseConfig {
            database_url: self.database_url.clone(),
            auth_token: self.auth_token.clone(),
            storage,
            timeout: self.timeout,
        })
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, StoreInitError> {
    Url::parse(raw).map_err(|source| StoreInitError::InvalidUrl { var, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = StoreConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, StoreInitError::MissingConfig(ENV_DB_URL)));

        let blank = StoreConfig::from_lookup(lookup(&[(ENV_DB_URL, "   ")])).unwrap_err();
        assert!(matches!(blank, StoreInitError::MissingConfig(_)));
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let config =
            StoreConfig::from_lookup(lookup(&[(ENV_DB_URL, "https://demo.firebaseio.com")]))
                .unwrap();
        assert_eq!(config.settings, StoreSettings::default());
        assert_eq!(config.auth_token, None);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.storage_url.as_str(), "https://firebasestorage.googleapis.com/");
        assert!(config.firebase().unwrap().storage.is_none());
    }

    #[test]
    fn blob_mode_reads_folder_and_requires_bucket() {
        let config = StoreConfig::from_lookup(lookup(&[
            (ENV_DB_URL, "https://demo.firebaseio.com"),
            (ENV_AUDIO_MODE, "BLOB"),
            (ENV_AUDIO_FOLDER, "recordings"),
        ]))
        .unwrap();
        assert_eq!(
            config.settings.audio,
            AudioMode::Blob {
                folder: "recordings".into()
            }
        );
        assert!(matches!(
            config.firebase(),
            Err(StoreInitError::MissingBucket(ENV_STORAGE_BUCKET))
        ));

        let with_bucket = StoreConfig {
            storage_bucket: Some("demo.appspot.com".into()),
            ..config
        };
        let firebase = with_bucket.firebase().unwrap();
        assert_eq!(firebase.storage.unwrap().bucket, "demo.appspot.com");
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            StoreConfig::from_lookup(lookup(&[(ENV_DB_URL, "not a url")])),
            Err(StoreInitError::InvalidUrl { var: ENV_DB_URL, .. })
        ));
        assert!(matches!(
            StoreConfig::from_lookup(lookup(&[
                (ENV_DB_URL, "https://demo.firebaseio.com"),
                (ENV_AUDIO_MODE, "tape"),
            ])),
            Err(StoreInitError::InvalidSetting { var: ENV_AUDIO_MODE, .. })
        ));
        assert!(matches!(
            StoreConfig::from_lookup(lookup(&[
                (ENV_DB_URL, "https://demo.firebaseio.com"),
                (ENV_HTTP_TIMEOUT, "soon"),
            ])),
            Err(StoreInitError::InvalidSetting { var: ENV_HTTP_TIMEOUT, .. })
        ));
    }

    #[test]
    fn auth_and_root_are_trimmed() {
        let config = StoreConfig::from_lookup(lookup(&[
            (ENV_DB_URL, "https://demo.firebaseio.com"),
            (ENV_DB_AUTH, " secret "),
            (ENV_DB_ROOT, "/practice"),
        ]))
        .unwrap();
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.settings.root, "/practice");
    }
}
