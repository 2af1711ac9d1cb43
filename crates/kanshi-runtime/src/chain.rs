//! Stand-alone media chain used when no host application is attached.

use kanshi_api::traits::{MediaChain, MediaInfo, RecognizeRequest};
use kanshi_core::error::KanshiError;
use kanshi_core::storage::RANK_PLUGIN;

use crate::db::DbHandle;

const SUBSCRIPTIONS_KEY: &str = "subscriptions";

/// Recognizes every title as itself and keeps subscription requests in
/// local storage, for a host to pick up.
#[derive(Clone)]
pub struct LocalChain {
    db: DbHandle,
}

impl LocalChain {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub async fn subscriptions(&self) -> Result<Vec<MediaInfo>, KanshiError> {
        match self.db.get_value(RANK_PLUGIN, SUBSCRIPTIONS_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }
}

fn same_title(a: &MediaInfo, b: &MediaInfo) -> bool {
    match (&a.douban_id, &b.douban_id) {
        (Some(x), Some(y)) => x == y,
        _ => a.title == b.title && a.year == b.year,
    }
}

impl MediaChain for LocalChain {
    type Error = KanshiError;

    async fn recognize(&self, request: &RecognizeRequest) -> Result<Option<MediaInfo>, KanshiError> {
        Ok(Some(MediaInfo {
            title: request.title.clone(),
            year: request.year.map(|y| y.to_string()),
            media_type: request.media_type,
            tmdb_id: None,
            douban_id: request.douban_id.clone(),
            poster: None,
            overview: None,
            season: None,
        }))
    }

    async fn exists_in_library(&self, _info: &MediaInfo) -> Result<bool, KanshiError> {
        Ok(false)
    }

    async fn subscription_exists(&self, info: &MediaInfo) -> Result<bool, KanshiError> {
        Ok(self.subscriptions().await?.iter().any(|s| same_title(s, info)))
    }

    async fn add_subscription(&self, info: &MediaInfo) -> Result<(), KanshiError> {
        let mut subs = self.subscriptions().await?;
        if subs.iter().any(|s| same_title(s, info)) {
            return Ok(());
        }
        tracing::info!(title = %info.title_year(), "subscription requested");
        subs.push(info.clone());
        self.db
            .save_value(RANK_PLUGIN, SUBSCRIPTIONS_KEY, serde_json::to_value(&subs)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanshi_core::models::MediaType;

    #[tokio::test]
    async fn test_subscriptions_are_stored_once() {
        let chain = LocalChain::new(DbHandle::open_memory().unwrap());
        let info = chain
            .recognize(&RecognizeRequest {
                title: "沙丘2".into(),
                year: Some(2024),
                media_type: MediaType::Movie,
                douban_id: Some("34937650".into()),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.year.as_deref(), Some("2024"));

        assert!(!chain.subscription_exists(&info).await.unwrap());
        chain.add_subscription(&info).await.unwrap();
        chain.add_subscription(&info).await.unwrap();
        assert!(chain.subscription_exists(&info).await.unwrap());
        assert_eq!(chain.subscriptions().await.unwrap().len(), 1);
    }
}
