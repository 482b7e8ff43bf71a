//! Byte sources: where asset bytes and signed URLs come from.
//!
//! The loader only talks to the [`Fetch`] and [`SignUrl`] seams, so hosts can
//! swap transports (and tests can count requests) without touching parsing
//! or caching.

use futures::{FutureExt, future::LocalBoxFuture};
use serde::Deserialize;

use crate::error::FetchError;

/// Retrieves the raw bytes behind a path or URL.
pub trait Fetch {
    fn fetch<'a>(&'a self, location: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>>;
}

/// Exchanges a private-storage path for a time-limited signed URL.
pub trait SignUrl {
    fn sign<'a>(&'a self, path: &'a str) -> LocalBoxFuture<'a, anyhow::Result<String>>;
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Default transport: HTTP(S) through reqwest, everything else from disk
/// (native) or relative to the page origin (wasm).
pub struct HttpSource {
    client: reqwest::Client,
    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    base_dir: std::path::PathBuf,
}

impl HttpSource {
    pub fn new(base_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_dir: base_dir.into(),
        }
    }

    async fn fetch_remote(&self, url: reqwest::Url) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(anyhow::Error::from)?;
        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(FetchError::NotFound),
            reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::UNAUTHORIZED => {
                Err(FetchError::Forbidden)
            }
            status if !status.is_success() => Err(FetchError::Other(anyhow::anyhow!(
                "unexpected status {status}"
            ))),
            _ => Ok(response
                .bytes()
                .await
                .map_err(anyhow::Error::from)?
                .to_vec()),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn fetch_local(&self, file_name: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.base_dir.join(file_name.trim_start_matches('/'));
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound,
            std::io::ErrorKind::PermissionDenied => FetchError::Forbidden,
            _ => FetchError::Other(anyhow::Error::from(e).context(path.display().to_string())),
        })
    }

    #[cfg(target_arch = "wasm32")]
    async fn fetch_local(&self, file_name: &str) -> Result<Vec<u8>, FetchError> {
        let url = format_url(file_name)?;
        self.fetch_remote(url).await
    }
}

impl Fetch for HttpSource {
    fn fetch<'a>(&'a self, location: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
        async move {
            if is_remote(location) {
                let url = reqwest::Url::parse(location).map_err(anyhow::Error::from)?;
                self.fetch_remote(url).await
            } else {
                self.fetch_local(location).await
            }
        }
        .boxed_local()
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window available"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page origin unavailable"))?;
    let base = reqwest::Url::parse(&format!("{}/", origin))?;
    Ok(base.join(file_name.trim_start_matches('/'))?)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedUrlResponse {
    signed_url: String,
}

/// Client for the collaborator endpoint issuing signed URLs.
pub struct SignedUrlEndpoint {
    client: reqwest::Client,
    endpoint: String,
}

impl SignedUrlEndpoint {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    fn endpoint_url(&self) -> anyhow::Result<reqwest::Url> {
        if is_remote(&self.endpoint) {
            return Ok(reqwest::Url::parse(&self.endpoint)?);
        }
        #[cfg(target_arch = "wasm32")]
        {
            format_url(&self.endpoint)
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            anyhow::bail!(
                "signed-url endpoint {} must be absolute outside the browser",
                self.endpoint
            )
        }
    }
}

impl SignUrl for SignedUrlEndpoint {
    fn sign<'a>(&'a self, path: &'a str) -> LocalBoxFuture<'a, anyhow::Result<String>> {
        async move {
            let mut url = self.endpoint_url()?;
            url.query_pairs_mut().append_pair("url", path);
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                anyhow::bail!("signed-url exchange for {path} answered {status}");
            }
            let body = response.bytes().await?;
            let parsed: SignedUrlResponse = serde_json::from_slice(&body)?;
            Ok(parsed.signed_url)
        }
        .boxed_local()
    }
}
