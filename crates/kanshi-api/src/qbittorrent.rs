use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;
use url::Url;

use kanshi_core::limiter::DownloaderKind;

use crate::error::{base_url, check_response, ApiError};
use crate::traits::Downloader;

/// qBittorrent Web API (v2) client.
///
/// Limits are sent in bytes per second; 0 means unlimited.
pub struct QbittorrentClient {
    name: String,
    base: Url,
    username: String,
    password: String,
    sid: Mutex<Option<String>>,
    http: Client,
}

impl QbittorrentClient {
    pub fn new(
        name: String,
        host: &str,
        username: String,
        password: String,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            name,
            base: base_url(host)?,
            username,
            password,
            sid: Mutex::new(None),
            http: Client::new(),
        })
    }

    async fn login(&self) -> Result<String, ApiError> {
        let resp = self
            .http
            .post(self.base.join("api/v2/auth/login")?)
            .header("Referer", self.base.as_str())
            .form(&[("username", &self.username), ("password", &self.password)])
            .send()
            .await?;
        let resp = check_response(resp).await?;

        let sid = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(parse_sid);
        match sid {
            Some(sid) => {
                tracing::debug!(downloader = %self.name, "qBittorrent login ok");
                Ok(sid)
            }
            None => Err(ApiError::Auth(format!(
                "{}: login rejected ({})",
                self.name,
                resp.text().await.unwrap_or_default().trim()
            ))),
        }
    }

    async fn set_limit(&self, path: &str, kib: i64) -> Result<(), ApiError> {
        let bytes = (kib.max(0) * 1024).to_string();
        let url = self.base.join(path)?;

        let mut sid = self.sid.lock().await;
        for attempt in 0..2 {
            let cookie = match sid.as_ref() {
                Some(cookie) => cookie.clone(),
                None => {
                    let fresh = self.login().await?;
                    *sid = Some(fresh.clone());
                    fresh
                }
            };
            let resp = self
                .http
                .post(url.clone())
                .header(COOKIE, format!("SID={cookie}"))
                .form(&[("limit", bytes.as_str())])
                .send()
                .await?;

            if resp.status() == StatusCode::FORBIDDEN && attempt == 0 {
                // Session expired.
                *sid = None;
                continue;
            }
            check_response(resp).await?;
            return Ok(());
        }
        Err(ApiError::Auth(format!("{}: session rejected", self.name)))
    }
}

fn parse_sid(header: &str) -> Option<String> {
    header
        .split(';')
        .next()
        .and_then(|pair| pair.trim().strip_prefix("SID="))
        .map(str::to_string)
}

impl Downloader for QbittorrentClient {
    type Error = ApiError;

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DownloaderKind {
        DownloaderKind::Qbittorrent
    }

    async fn set_speed_limit(&self, upload: i64, download: i64) -> Result<(), ApiError> {
        self.set_limit("api/v2/transfer/setUploadLimit", upload).await?;
        self.set_limit("api/v2/transfer/setDownloadLimit", download)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sid() {
        assert_eq!(
            parse_sid("SID=abc123; HttpOnly; SameSite=Strict; path=/").as_deref(),
            Some("abc123")
        );
        assert_eq!(parse_sid("other=1; path=/"), None);
    }
}
