use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::models::Work;

/// The storage server as seen from an editing session.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_works(&self) -> Result<Vec<Work>>;
    async fn upsert_work(&self, work: &Work) -> Result<()>;
    async fn delete_work(&self, id: &str) -> Result<()>;
    /// Uploads an image (data URI or raw base64) and returns its URL.
    async fn upload_image(&self, data: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct SavedImage {
    url: String,
}

pub struct HttpRemoteStore {
    client: reqwest::Client,
    api_url: String,
}

impl HttpRemoteStore {
    pub fn new(api_url: impl Into<String>) -> Self {
        HttpRemoteStore {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn list_works(&self) -> Result<Vec<Work>> {
        let works = self
            .client
            .get(self.endpoint("works"))
            .send()
            .await
            .context("fetching works")?
            .error_for_status()?
            .json()
            .await?;
        Ok(works)
    }

    async fn upsert_work(&self, work: &Work) -> Result<()> {
        self.client
            .post(self.endpoint("works"))
            .json(work)
            .send()
            .await
            .with_context(|| format!("saving work {}", work.id))?
            .error_for_status()?;
        Ok(())
    }

    async fn delete_work(&self, id: &str) -> Result<()> {
        self.client
            .delete(self.endpoint(&format!("works/{id}")))
            .send()
            .await
            .with_context(|| format!("deleting work {id}"))?
            .error_for_status()?;
        Ok(())
    }

    async fn upload_image(&self, data: &str) -> Result<String> {
        let saved: SavedImage = self
            .client
            .post(self.endpoint("save-image"))
            .json(&json!({ "image": data }))
            .send()
            .await
            .context("uploading image")?
            .error_for_status()?
            .json()
            .await?;
        Ok(saved.url)
    }
}
