use async_trait::async_trait;
use reqwest::Client;
use tokio::time::Duration;
use tracing::debug;

use crate::error::FetchError;

/// Retrieves the raw text of a calendar feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Downloads feeds over HTTP(S). A single attempt is made per call.
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("Sending HTTP request");
        // Errors are logged, and the url may carry a private token.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        debug!("Reading response body");
        Ok(response.text().await.map_err(reqwest::Error::without_url)?)
    }
}
