use super::{BlobStore, SiteCredentials};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

pub const DEFAULT_BLOBS_URL: &str = "https://api.netlify.com/api/v1/blobs";

/// Remote blob API: `{base}/{site_id}/{store}/{key}` with bearer auth.
pub struct HttpBlobStore {
    base_url: Url,
    site: SiteCredentials,
    name: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    blobs: Vec<ListedBlob>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedBlob {
    key: String,
}

impl HttpBlobStore {
    pub fn new(base_url: &str, site: SiteCredentials, name: &str) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid blobs url: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("blobs url cannot be a base: {}", base_url);
        }
        Ok(Self {
            base_url,
            site,
            name: name.to_string(),
            client: reqwest::Client::new(),
        })
    }

    pub(crate) fn url_for(&self, key: Option<&str>) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("blobs url cannot be a base"))?;
            segs.pop_if_empty();
            segs.push(&self.site.site_id);
            segs.push(&self.name);
            if let Some(k) = key {
                segs.push(k);
            }
        }
        Ok(url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.site.token))
    }
}

async fn fail(op: &str, key: &str, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    anyhow::anyhow!("blob {} {} failed ({}): {}", op, key, status, body)
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let resp = self
            .authed(self.client.get(self.url_for(Some(key))?))
            .send()
            .await
            .with_context(|| format!("blob get {}", key))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(fail("get", key, resp).await);
        }
        Ok(Some(resp.json().await?))
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        let resp = self
            .authed(self.client.put(self.url_for(Some(key))?))
            .json(value)
            .send()
            .await
            .with_context(|| format!("blob set {}", key))?;
        if !resp.status().is_success() {
            return Err(fail("set", key, resp).await);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let resp = self
            .authed(self.client.delete(self.url_for(Some(key))?))
            .send()
            .await
            .with_context(|| format!("blob delete {}", key))?;
        if resp.status() == StatusCode::NOT_FOUND || resp.status().is_success() {
            return Ok(());
        }
        Err(fail("delete", key, resp).await)
    }

    async fn list(&self) -> anyhow::Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut url = self.url_for(None)?;
            if let Some(c) = &cursor {
                url.query_pairs_mut().append_pair("cursor", c);
            }
            let resp = self
                .authed(self.client.get(url))
                .send()
                .await
                .with_context(|| format!("blob list {}", self.name))?;
            if !resp.status().is_success() {
                return Err(fail("list", &self.name, resp).await);
            }
            let page: ListPage = resp.json().await?;
            keys.extend(page.blobs.into_iter().map(|b| b.key));
            match page.next_cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }
        Ok(keys)
    }

    fn store_name(&self) -> &str {
        &self.name
    }
}
