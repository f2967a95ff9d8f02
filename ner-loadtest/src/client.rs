use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_LENGTH;
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use ner_load_util::drain::DrainBodyFuture;

const MAX_PREALLOC: usize = 1 << 20;

/// Pooled http/1 client, clones share the pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Option<Duration>,
}

impl HttpClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// `timeout` bounds the whole exchange, body included.
    #[must_use]
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }

    pub async fn send_recv(&self, request: Request<Full<Bytes>>) -> Result<(StatusCode, Vec<u8>)> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(request))
                .await
                .with_context(|| format!("Request timed out after {}ms", limit.as_millis()))?,
            None => self.exchange(request).await,
        }
    }

    async fn exchange(&self, request: Request<Full<Bytes>>) -> Result<(StatusCode, Vec<u8>)> {
        let resp = self
            .client
            .request(request)
            .await
            .context("Failed to send request")?;
        let status = resp.status();
        let content_length: usize = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|hv| hv.to_str().ok())
            .and_then(|hv| hv.parse().ok())
            .map_or(1024, |len: usize| len.min(MAX_PREALLOC));
        let bytes: Vec<u8> =
            DrainBodyFuture::new_trusted_length(resp.into_body(), content_length)
                .await
                .context("Failed to read response body")?;
        Ok((status, bytes))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}
