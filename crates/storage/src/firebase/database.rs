use std::sync::Arc;

use async_trait::async_trait;
use reading_core::PushIdGenerator;
use reqwest::{Client, Response};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::path::TreePath;
use crate::repository::{StorageError, TreeStore};

/// Tree database reached through its REST surface: every node is addressable
/// as `<base>/<path>.json`.
#[derive(Clone)]
pub struct RealtimeDatabase {
    client: Client,
    base_url: Url,
    auth: Option<String>,
    push_ids: Arc<PushIdGenerator>,
}

impl RealtimeDatabase {
    #[must_use]
    pub fn new(
        client: Client,
        base_url: Url,
        auth: Option<String>,
        push_ids: Arc<PushIdGenerator>,
    ) -> Self {
        Self {
            client,
            base_url,
            auth,
            push_ids,
        }
    }

    fn endpoint(&self, path: &TreePath) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                StorageError::InvalidPath(format!("{} cannot hold a path", self.base_url))
            })?;
            segments.pop_if_empty();
            match path.segments().split_last() {
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{last}.json"));
                }
                None => {
                    segments.push(".json");
                }
            }
        }
        if let Some(auth) = &self.auth {
            url.query_pairs_mut().append_pair("auth", auth);
        }
        Ok(url)
    }
}

fn check(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StorageError::HttpStatus(status))
    }
}

#[async_trait]
impl TreeStore for RealtimeDatabase {
    async fn get(&self, path: &TreePath) -> Result<Option<Value>, StorageError> {
        debug!(%path, "tree get");
        let response = self.client.get(self.endpoint(path)?).send().await?;
        let value: Value = check(response)?.json().await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn set(&self, path: &TreePath, value: Value) -> Result<(), StorageError> {
        debug!(%path, "tree set");
        let response = self
            .client
            .put(self.endpoint(path)?)
            .json(&value)
            .send()
            .await?;
        check(response)?;
        Ok(())
    }

    async fn update(
        &self,
        path: &TreePath,
        writes: Vec<(TreePath, Value)>,
    ) -> Result<(), StorageError> {
        if writes.is_empty() {
            return Ok(());
        }
        let body: Map<String, Value> = writes
            .into_iter()
            .map(|(relative, value)| (relative.segments().join("/"), value))
            .collect();
        debug!(%path, fields = body.len(), "tree update");
        let response = self
            .client
            .patch(self.endpoint(path)?)
            .json(&body)
            .send()
            .await?;
        check(response)?;
        Ok(())
    }

    fn push_key(&self) -> String {
        self.push_ids.next_id()
    }
}
