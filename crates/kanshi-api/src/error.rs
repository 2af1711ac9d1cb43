use thiserror::Error;

/// Errors from the HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

/// Check the HTTP response for errors and return the body text on failure.
pub(crate) async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(status, "upstream API error");
        Err(ApiError::Api {
            status,
            message: body,
        })
    }
}

/// Parse a configured host into a base URL ending in `/`.
///
/// A missing scheme defaults to `http://`.
pub(crate) fn base_url(host: &str) -> Result<url::Url, ApiError> {
    let host = host.trim();
    let mut text = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    if !text.ends_with('/') {
        text.push('/');
    }
    Ok(url::Url::parse(&text)?)
}
