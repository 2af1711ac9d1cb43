use reqwest::Client;
use serde::Deserialize;

use kanshi_core::rank::RankFeed;

use crate::error::{check_response, ApiError};
use crate::traits::RankFeedSource;

/// Mobile browser UA; the rexxar API rejects unknown agents.
const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
                          AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148";

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    #[serde(default)]
    subject_collection_items: Vec<serde_json::Value>,
}

/// Douban subject-collection client.
pub struct DoubanClient {
    http: Client,
}

impl DoubanClient {
    /// Build a client, routing through `proxy` when given.
    pub fn new(proxy: Option<&str>) -> Result<Self, ApiError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }
}

impl RankFeedSource for DoubanClient {
    type Error = ApiError;

    async fn fetch_items(&self, feed: &RankFeed) -> Result<Vec<serde_json::Value>, ApiError> {
        tracing::debug!(feed = feed.value, "fetching rank feed");
        let resp = self
            .http
            .get(feed.address())
            .header("Referer", feed.referer)
            .send()
            .await?;

        let resp = check_response(resp).await?;
        let body: CollectionResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(body.subject_collection_items)
    }
}
