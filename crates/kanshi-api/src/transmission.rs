use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio::sync::Mutex;
use url::Url;

use kanshi_core::limiter::DownloaderKind;

use crate::error::{base_url, check_response, ApiError};
use crate::traits::Downloader;

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Transmission RPC client.
///
/// A negative limit disables the corresponding speed limit.
pub struct TransmissionClient {
    name: String,
    rpc: Url,
    username: String,
    password: String,
    session_id: Mutex<Option<String>>,
    http: Client,
}

impl TransmissionClient {
    pub fn new(
        name: String,
        host: &str,
        username: String,
        password: String,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            name,
            rpc: base_url(host)?.join("transmission/rpc")?,
            username,
            password,
            session_id: Mutex::new(None),
            http: Client::new(),
        })
    }

    async fn call(&self, body: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
        let mut session = self.session_id.lock().await;
        for _ in 0..2 {
            let mut req = self.http.post(self.rpc.clone()).json(body);
            if !self.username.is_empty() {
                req = req.basic_auth(&self.username, Some(&self.password));
            }
            if let Some(id) = session.as_ref() {
                req = req.header(SESSION_HEADER, id);
            }
            let resp = req.send().await?;

            if resp.status() == StatusCode::CONFLICT {
                // Server hands out a fresh session id with the 409.
                *session = resp
                    .headers()
                    .get(SESSION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                continue;
            }
            let resp = check_response(resp).await?;
            let reply: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()))?;
            return match reply.get("result").and_then(|r| r.as_str()) {
                Some("success") => Ok(reply),
                other => Err(ApiError::Api {
                    status: 200,
                    message: other.unwrap_or("missing result").to_string(),
                }),
            };
        }
        Err(ApiError::Auth(format!("{}: no session id", self.name)))
    }
}

/// `session-set` arguments for a pair of limits.
fn limit_arguments(upload: i64, download: i64) -> serde_json::Value {
    let mut args = serde_json::Map::new();
    for (key, value) in [("speed-limit-up", upload), ("speed-limit-down", download)] {
        args.insert(format!("{key}-enabled"), json!(value >= 0));
        if value >= 0 {
            args.insert(key.to_string(), json!(value));
        }
    }
    serde_json::Value::Object(args)
}

impl Downloader for TransmissionClient {
    type Error = ApiError;

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DownloaderKind {
        DownloaderKind::Transmission
    }

    async fn set_speed_limit(&self, upload: i64, download: i64) -> Result<(), ApiError> {
        let body = json!({
            "method": "session-set",
            "arguments": limit_arguments(upload, download),
        });
        self.call(&body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_arguments() {
        let args = limit_arguments(512, -1);
        assert_eq!(args["speed-limit-up-enabled"], true);
        assert_eq!(args["speed-limit-up"], 512);
        assert_eq!(args["speed-limit-down-enabled"], false);
        assert!(args.get("speed-limit-down").is_none());
    }
}
