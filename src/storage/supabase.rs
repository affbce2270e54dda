//! Storage REST API client (`/storage/v1`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};

use super::{ObjectStore, StoredObject};

pub struct SupabaseStorage {
    http: Client,
    base: Url,
    key: String,
    bucket: String,
    public_prefix: String,
    list_limit: usize,
}

impl SupabaseStorage {
    pub fn new(
        base_url: &str,
        key: &str,
        bucket: &str,
        public_prefix: &str,
        list_limit: usize,
    ) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("invalid storage URL: {base_url}"))?;
        Ok(Self {
            http: Client::new(),
            base,
            key: key.to_string(),
            bucket: bucket.to_string(),
            public_prefix: public_prefix.to_string(),
            list_limit,
        })
    }

    pub fn from_config(config: &crate::config::PicsearchConfig) -> Result<Self> {
        Self::new(
            config.storage_url(),
            config.storage_key(),
            &config.storage.bucket,
            &config.public_url_prefix(),
            config.storage.list_limit,
        )
    }

    /// `<base>/storage/v1/<segments...>` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("storage URL cannot be a base: {}", self.base))?
            .pop_if_empty()
            .extend(["storage", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.endpoint(&["object", &self.bucket, name])?;
        let size = bytes.len();
        let response = self
            .authorized(self.http.post(url))
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("upload request failed for {name}"))?;
        ensure_success(response, "upload").await?;

        tracing::info!(name, size, content_type, bucket = %self.bucket, "object uploaded");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StoredObject>> {
        let url = self.endpoint(&["object", "list", &self.bucket])?;
        let body = serde_json::json!({
            "prefix": "",
            "limit": self.list_limit,
            "offset": 0,
            "sortBy": { "column": "created_at", "order": "asc" },
        });
        let response = self
            .authorized(self.http.post(url))
            .json(&body)
            .send()
            .await
            .context("list request failed")?;
        let objects: Vec<StoredObject> = ensure_success(response, "list")
            .await?
            .json()
            .await
            .context("failed to parse bucket listing")?;

        tracing::debug!(bucket = %self.bucket, count = objects.len(), "bucket listed");
        Ok(objects)
    }

    async fn remove(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&["object", &self.bucket])?;
        let response = self
            .authorized(self.http.delete(url))
            .json(&serde_json::json!({ "prefixes": names }))
            .send()
            .await
            .context("remove request failed")?;
        ensure_success(response, "remove").await?;

        tracing::info!(count = names.len(), bucket = %self.bucket, "objects removed");
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        super::object_url(&self.public_prefix, name)
    }
}

/// Turn a non-2xx response into an error carrying the status and body.
pub(crate) async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("{what} failed with HTTP {status}: {body}")
}
