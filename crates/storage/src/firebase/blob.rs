use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header::CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::payload::decode_payload;
use crate::repository::{BlobStore, StorageError};

pub const DEFAULT_STORAGE_URL: &str = "https://firebasestorage.googleapis.com";

/// Object storage reached through its v0 REST surface.
#[derive(Clone)]
pub struct CloudStorage {
    client: Client,
    base_url: Url,
    bucket: String,
    auth: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    #[serde(default)]
    download_tokens: Option<String>,
}

impl CloudStorage {
    #[must_use]
    pub fn new(client: Client, base_url: Url, bucket: String, auth: Option<String>) -> Self {
        Self {
            client,
            base_url,
            bucket,
            auth,
        }
    }

    /// `<base>/v0/b/<bucket>/o`, optionally followed by the object name as a
    /// single encoded segment.
    fn objects_url(&self, object: Option<&str>) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                StorageError::InvalidPath(format!("{} cannot hold a path", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.extend(["v0", "b", self.bucket.as_str(), "o"]);
            if let Some(object) = object {
                segments.push(object);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound);
    }
    if status.is_success() {
        Ok(response)
    } else {
        Err(StorageError::HttpStatus(status))
    }
}

#[async_trait]
impl BlobStore for CloudStorage {
    async fn upload_base64(&self, path: &str, payload: &str) -> Result<(), StorageError> {
        let decoded = decode_payload(payload)?;
        let mut url = self.objects_url(None)?;
        url.query_pairs_mut().append_pair("name", path);
        debug!(path, bytes = decoded.bytes.len(), "blob upload");

        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, decoded.content_type)
            .body(decoded.bytes);
        check(self.authorized(request).send().await?)?;
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        let url = self.objects_url(Some(path))?;
        let response = check(self.authorized(self.client.get(url.clone())).send().await?)?;
        let metadata: ObjectMetadata = response.json().await?;

        let mut download = url;
        {
            let mut query = download.query_pairs_mut();
            query.append_pair("alt", "media");
            // Several tokens may be listed; any one of them grants access.
            if let Some(token) = metadata
                .download_tokens
                .as_deref()
                .and_then(|tokens| tokens.split(',').next())
                .filter(|t| !t.is_empty())
            {
                query.append_pair("token", token);
            }
        }
        Ok(download.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> CloudStorage {
        CloudStorage::new(
            Client::new(),
            Url::parse(DEFAULT_STORAGE_URL).unwrap(),
            "demo.appspot.com".into(),
            None,
        )
    }

    #[test]
    fn object_names_become_one_encoded_segment() {
        let url = storage().objects_url(Some("audio/aya::/-N1")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://firebasestorage.googleapis.com/v0/b/demo.appspot.com/o/audio%2Faya::%2F-N1"
        );
    }

    #[test]
    fn upload_url_has_no_object_segment() {
        let url = storage().objects_url(None).unwrap();
        assert_eq!(url.path(), "/v0/b/demo.appspot.com/o");
    }
}
