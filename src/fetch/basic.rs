use std::time::Duration;

use super::client::HttpClient;
use anyhow::Context;
use async_trait::async_trait;

/// Plain `reqwest` client. Gzip-encoded bodies are decoded transparently.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// `timeout` bounds the whole request, body included.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> anyhow::Result<reqwest::Response> {
        // The URL may carry the API key.
        Ok(self.0.execute(req).await.map_err(|e| e.without_url())?)
    }
}
