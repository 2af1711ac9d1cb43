use reqwest::Client;
use serde::Serialize;

use crate::error::{check_response, ApiError};
use crate::traits::Notifier;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<&'a str>,
}

/// Posts notifications as JSON to a webhook endpoint.
pub struct WebhookNotifier {
    url: String,
    http: Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http: Client::new(),
        }
    }
}

impl Notifier for WebhookNotifier {
    type Error = ApiError;

    async fn post(&self, title: &str, body: &str, link: Option<&str>) -> Result<(), ApiError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&WebhookPayload {
                title,
                text: body,
                link,
            })
            .send()
            .await?;
        check_response(resp).await?;
        Ok(())
    }
}
