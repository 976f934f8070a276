//! IPFS-style HTTP content store.
//!
//! Uploads go to the node API (`POST {api}/api/v0/add`), reads go to a
//! gateway (`GET {gateway}/ipfs/{cid}`). Pinning services that front the API
//! take a bearer token.

use std::time::Duration;

use council_config::CouncilConfig;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use url::Url;

use crate::{ContentStore, IPFS_SCHEME, StoreError, StoreFuture, parse_cid};

// Caps memory use when a gateway misbehaves; encrypted payloads are small.
const MAX_CONTENT_BYTES: usize = 8 * 1024 * 1024;

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

pub struct HttpContentStore {
    client: reqwest::Client,
    api_url: Url,
    gateway_url: Url,
    api_token: Option<String>,
}

// Manual Debug impl to prevent leaking the pinning token in logs.
impl std::fmt::Debug for HttpContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpContentStore")
            .field("api_url", &self.api_url.as_str())
            .field("gateway_url", &self.gateway_url.as_str())
            .field(
                "api_token",
                &if self.api_token.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .finish_non_exhaustive()
    }
}

impl HttpContentStore {
    pub fn new(
        api_url: &str,
        gateway_url: &str,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_url: parse_base(api_url)?,
            gateway_url: parse_base(gateway_url)?,
            api_token,
        })
    }

    pub fn from_config(config: &CouncilConfig) -> Result<Self, StoreError> {
        Self::new(
            &config.content_api_url(),
            &config.content_gateway_url(),
            config.content_api_token(),
            config.content_timeout(),
        )
    }

    fn add_url(&self) -> Result<Url, StoreError> {
        let mut url = self
            .api_url
            .join("api/v0/add")
            .map_err(|e| StoreError::InvalidUri(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("pin", "true")
            .append_pair("cid-version", "1");
        Ok(url)
    }

    fn gateway_url_for(&self, cid: &str) -> Result<Url, StoreError> {
        self.gateway_url
            .join(&format!("ipfs/{cid}"))
            .map_err(|e| StoreError::InvalidUri(e.to_string()))
    }

    async fn upload(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let url = self.add_url()?;
        let form = Form::new().part(
            "file",
            Part::bytes(bytes.to_vec()).file_name("payload.json"),
        );
        let mut request = self.client.post(url.clone()).multipart(form);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                uri: url.to_string(),
            });
        }
        let body: AddResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        if body.hash.is_empty() {
            return Err(StoreError::Malformed("empty content identifier".to_string()));
        }
        let uri = format!("{IPFS_SCHEME}{}", body.hash);
        tracing::info!(%uri, bytes = bytes.len(), "Published content");
        Ok(uri)
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.gateway_url_for(parse_cid(uri)?)?;
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                uri: uri.to_string(),
            });
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_CONTENT_BYTES as u64)
        {
            return Err(StoreError::Malformed(format!(
                "content exceeds {MAX_CONTENT_BYTES} bytes"
            )));
        }
        let bytes = response.bytes().await.map_err(transport)?;
        if bytes.len() > MAX_CONTENT_BYTES {
            return Err(StoreError::Malformed(format!(
                "content exceeds {MAX_CONTENT_BYTES} bytes"
            )));
        }
        tracing::debug!(%uri, bytes = bytes.len(), "Fetched content");
        Ok(bytes.to_vec())
    }
}

impl ContentStore for HttpContentStore {
    fn put<'a>(&'a self, bytes: &'a [u8]) -> StoreFuture<'a, String> {
        Box::pin(self.upload(bytes))
    }

    fn get<'a>(&'a self, uri: &'a str) -> StoreFuture<'a, Vec<u8>> {
        Box::pin(self.download(uri))
    }
}

/// Base URLs need a trailing slash or `join` drops their last segment.
fn parse_base(raw: &str) -> Result<Url, StoreError> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    let url = Url::parse(&raw).map_err(|e| StoreError::InvalidUri(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(StoreError::InvalidUri(format!(
            "unsupported scheme `{other}` in {raw}"
        ))),
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}
