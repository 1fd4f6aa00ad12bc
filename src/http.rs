//! HTTP client abstraction so the resolver, catalog and downloader can be
//! driven by an in-memory client in tests.

use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::MediaError;

/// A connection-level failure: DNS, refused connection, reset mid-body.
///
/// Distinct from a non-2xx status, which is a well-formed response.
#[derive(Error, Debug, Clone)]
#[error("Transport error for {url}: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// A response whose body has not been read yet.
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub body: BodyStream,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the whole body into memory.
    pub async fn bytes(self) -> Result<Vec<u8>, TransportError> {
        self.body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
    }

    /// Read and decode a JSON body.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, MediaError> {
        let url = self.url.clone();
        let body = self.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| MediaError::Decode { url, source })
    }
}

#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a GET request. Only transport failures are errors; any status
    /// code comes back as an `HttpResponse`.
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

#[async_trait::async_trait]
impl HttpClient for reqwest::Client {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let resp = reqwest::Client::get(self, url)
            .send()
            .await
            .map_err(|e| TransportError::new(url, e.to_string()))?;

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let owned_url = url.to_string();
        let stream_url = owned_url.clone();

        Ok(HttpResponse {
            url: owned_url,
            status: resp.status().as_u16(),
            content_length: resp.content_length(),
            content_type,
            body: resp
                .bytes_stream()
                .map(move |chunk| chunk.map_err(|e| TransportError::new(&stream_url, e.to_string())))
                .boxed(),
        })
    }
}
