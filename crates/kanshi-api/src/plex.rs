use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use kanshi_core::limiter::backends::PlexSessions;
use kanshi_core::limiter::SessionRecord;
use kanshi_core::models::PlaybackSession;

use crate::error::{base_url, check_response, ApiError};
use crate::traits::MediaServer;

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    #[serde(rename = "MediaContainer")]
    media_container: Identity,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Identity {
    machine_identifier: String,
}

/// Plex Media Server.
pub struct PlexClient {
    name: String,
    base: Url,
    token: String,
    machine_id: OnceCell<String>,
    http: Client,
}

impl PlexClient {
    pub fn new(name: String, host: &str, token: String) -> Result<Self, ApiError> {
        Ok(Self {
            name,
            base: base_url(host)?,
            token,
            machine_id: OnceCell::new(),
            http: Client::new(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self
            .http
            .get(self.base.join(path)?)
            .header("X-Plex-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let resp = check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

impl MediaServer for PlexClient {
    type Error = ApiError;

    fn name(&self) -> &str {
        &self.name
    }

    async fn sessions(&self) -> Result<Vec<PlaybackSession>, ApiError> {
        let sessions: PlexSessions = self.get_json("status/sessions").await?;
        Ok(sessions
            .media_container
            .metadata
            .into_iter()
            .filter_map(|s| SessionRecord::Plex(s).normalize())
            .collect())
    }

    async fn play_url(&self, item_id: &str) -> Result<Option<String>, ApiError> {
        let machine_id = self
            .machine_id
            .get_or_try_init(|| async {
                let identity: IdentityResponse = self.get_json("identity").await?;
                Ok::<_, ApiError>(identity.media_container.machine_identifier)
            })
            .await?;
        Ok(Some(format!(
            "https://app.plex.tv/desktop/#!/server/{machine_id}/details?key=%2Flibrary%2Fmetadata%2F{item_id}"
        )))
    }
}
