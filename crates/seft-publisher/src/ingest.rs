//! Ingestion endpoint client
//!
//! Uploads one file per request to
//! `<base-url>/upload/<product>/<version>/<file-name>`. Exactly HTTP 200 counts
//! as ingested; anything else (other status, timeout, refused connection) is a
//! [`TransferError::Publish`]. The response body of a rejected upload is kept
//! for the log line and never interpreted.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

use crate::config::{IngestConfig, UploadMode};
use crate::error::{TransferError, TransferResult};

/// Content type of every uploaded file
pub const SPREADSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Multipart field name expected by the ingestion service
pub const MULTIPART_FIELD: &str = "files[]";

/// Longest response body excerpt carried into logs and errors
const MAX_DIAGNOSTIC_CHARS: usize = 512;

/// Something that accepts published files
#[async_trait]
pub trait IngestionEndpoint: Send + Sync {
    /// Upload one file; `Ok` only when ingestion was confirmed
    async fn publish(&self, name: &str, content: Vec<u8>) -> TransferResult<()>;

    /// Liveness probe; `true` when the endpoint answered 200
    async fn probe(&self) -> bool;
}

/// reqwest-backed ingestion client
#[derive(Clone)]
pub struct HttpIngestClient {
    client: Client,
    config: IngestConfig,
    base_url: Url,
}

impl HttpIngestClient {
    pub fn new(config: IngestConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("seft-publisher/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid ingestion base URL {:?}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Ingestion base URL {:?} cannot carry a path", config.base_url);
        }

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Upload URL for `name`
    ///
    /// Every segment is percent-encoded, so a file name containing `/`, `?`
    /// or `#` still reaches the endpoint as a single path segment.
    pub fn upload_url(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "upload",
                self.config.product.as_str(),
                self.config.version.as_str(),
                name,
            ]);
        }
        url
    }

    /// Liveness URL
    pub fn health_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.health_path.trim_start_matches('/')
        )
    }

    fn request(&self, name: &str, content: Vec<u8>) -> reqwest::Result<reqwest::RequestBuilder> {
        let request = self.client.post(self.upload_url(name));
        Ok(match self.config.upload_mode {
            UploadMode::Raw => request
                .header(reqwest::header::CONTENT_TYPE, SPREADSHEET_CONTENT_TYPE)
                .body(content),
            UploadMode::Multipart => {
                let part = multipart::Part::bytes(content)
                    .file_name(name.to_string())
                    .mime_str(SPREADSHEET_CONTENT_TYPE)?;
                request.multipart(multipart::Form::new().part(MULTIPART_FIELD, part))
            },
        })
    }
}

#[async_trait]
impl IngestionEndpoint for HttpIngestClient {
    async fn publish(&self, name: &str, content: Vec<u8>) -> TransferResult<()> {
        let failure = |status: Option<u16>, reason: String| TransferError::Publish {
            file: name.to_string(),
            status,
            reason,
        };

        let size = content.len();
        let request = self
            .request(name, content)
            .map_err(|e| failure(None, format!("Failed to build upload: {}", e)))?;

        let response = request
            .send()
            .await
            .map_err(|e| failure(None, format!("Upload request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::OK {
            debug!(file = %name, bytes = size, "Upload accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let diagnostic: String = body.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
        Err(failure(
            Some(status.as_u16()),
            format!("HTTP {}: {}", status.as_u16(), diagnostic.trim()),
        ))
    }

    async fn probe(&self) -> bool {
        match self.client.head(self.health_url()).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "Ingestion endpoint probe failed");
                false
            },
        }
    }
}
