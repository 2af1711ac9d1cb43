use kanshi_api::error::ApiError;
use kanshi_api::notify::WebhookNotifier;
use kanshi_api::traits::Notifier;

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    type Error = std::convert::Infallible;

    async fn post(
        &self,
        title: &str,
        body: &str,
        link: Option<&str>,
    ) -> Result<(), std::convert::Infallible> {
        tracing::info!(link, "{title}\n{body}");
        Ok(())
    }
}

/// Notifier picked from `[notify]`.
pub enum NotifierClient {
    Webhook(WebhookNotifier),
    Log(LogNotifier),
}

impl NotifierClient {
    pub fn from_url(url: Option<&str>) -> Self {
        match url.filter(|u| !u.trim().is_empty()) {
            Some(url) => Self::Webhook(WebhookNotifier::new(url.to_string())),
            None => Self::Log(LogNotifier),
        }
    }
}

impl Notifier for NotifierClient {
    type Error = ApiError;

    async fn post(&self, title: &str, body: &str, link: Option<&str>) -> Result<(), ApiError> {
        match self {
            Self::Webhook(n) => n.post(title, body, link).await,
            Self::Log(n) => match n.post(title, body, link).await {
                Ok(()) => Ok(()),
                Err(never) => match never {},
            },
        }
    }
}
