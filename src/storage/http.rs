//! Client for a running fandian sync server.
//!
//! ```text
//! GET  {base}/lists/{id}        → 200 list | 404
//! POST {base}/lists             → 200 stored list
//! POST {base}/lists/{id}/join   → 200 list
//! ```

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use fandian_shared::{JoinRequest, ListUpsert, RestaurantList};
use reqwest::{Client, Response, StatusCode};

use super::{RemoteError, RemoteStore};

pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn list_url(&self, list_id: &str) -> String {
        format!("{}/lists/{}", self.base_url, urlencoding::encode(list_id))
    }

    async fn read_list(resp: Response, list_id: &str) -> Result<RestaurantList, RemoteError> {
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(list_id.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::BAD_REQUEST => RemoteError::Rejected(body),
                _ => RemoteError::Backend(anyhow::anyhow!(
                    "request for list {list_id} failed with status {status}: {body}"
                )),
            });
        }
        resp.json()
            .await
            .map_err(|e| RemoteError::Backend(anyhow::anyhow!("malformed list {list_id}: {e}")))
    }
}

fn network(e: reqwest::Error) -> RemoteError {
    RemoteError::Network(e.to_string())
}

#[async_trait]
impl RemoteStore for HttpStore {
    fn backend_name(&self) -> &str {
        "http"
    }

    async fn get(&self, list_id: &str) -> Result<RestaurantList, RemoteError> {
        let resp = self
            .client
            .get(self.list_url(list_id))
            .send()
            .await
            .map_err(network)?;
        Self::read_list(resp, list_id).await
    }

    async fn put(&self, upsert: ListUpsert) -> Result<RestaurantList, RemoteError> {
        let label = upsert.target_id().unwrap_or("<new>").to_string();
        let resp = self
            .client
            .post(format!("{}/lists", self.base_url))
            .json(&upsert)
            .send()
            .await
            .map_err(network)?;
        Self::read_list(resp, &label).await
    }

    async fn join(
        &self,
        list_id: &str,
        request: &JoinRequest,
    ) -> Result<RestaurantList, RemoteError> {
        let resp = self
            .client
            .post(format!("{}/join", self.list_url(list_id)))
            .json(request)
            .send()
            .await
            .map_err(network)?;
        Self::read_list(resp, list_id).await
    }
}
