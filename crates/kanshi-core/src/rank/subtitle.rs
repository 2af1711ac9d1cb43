//! Extraction rules for the feed's `card_subtitle` field.
//!
//! The subtitle is free text of the form
//! `1994 / 美国 / 犯罪 剧情 / 弗兰克·德拉邦特 / 蒂姆·罗宾斯 摩根·弗里曼`.
//! The upstream format is fixed by the provider, so these rules are kept
//! positional: year is the first token, genres sit between the second and
//! third slash.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::KanshiError;
use crate::models::{MediaType, RankEntry, Region};

const DOMESTIC_MARKER: &str = "中国大陆";
const JAPAN_MARKER: &str = "日本";

static RE_GENRE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}\s*/\s*[^/]+/\s*([^/]+)/\s*").unwrap());

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    title: String,
    #[serde(rename = "type", default)]
    kind: String,
    card_subtitle: Option<String>,
    rating: Option<FeedRating>,
}

#[derive(Debug, Deserialize)]
struct FeedRating {
    #[serde(default)]
    value: f64,
    #[serde(default)]
    count: u64,
}

/// Build a [`RankEntry`] from one raw `subject_collection_items` element.
pub fn parse_feed_item(item: &serde_json::Value) -> Result<RankEntry, KanshiError> {
    let item: FeedItem = serde_json::from_value(item.clone())?;
    let subtitle = item
        .card_subtitle
        .ok_or_else(|| KanshiError::Parse(format!("{}: missing card_subtitle", item.title)))?;
    let year = extract_year(&subtitle).ok_or_else(|| {
        KanshiError::Parse(format!("{}: no year in subtitle {subtitle:?}", item.title))
    })?;
    let (genres_text, genres) = extract_genres(&subtitle);
    let (rating, vote_count) = item
        .rating
        .map(|r| (r.value, r.count))
        .unwrap_or((0.0, 0));

    let douban_id = match item.id {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };

    Ok(RankEntry {
        title: item.title,
        douban_id,
        media_type: MediaType::from_feed(&item.kind),
        year,
        rating,
        vote_count,
        genres,
        genres_text,
        subtitle,
    })
}

/// First whitespace-delimited token, parsed as a year.
pub fn extract_year(subtitle: &str) -> Option<i32> {
    subtitle.split_whitespace().next()?.parse().ok()
}

/// Genre segment (raw text) and its space-separated tokens.
///
/// Returns an empty segment when the subtitle has fewer than three
/// slash-delimited segments after the year.
pub fn extract_genres(subtitle: &str) -> (String, Vec<String>) {
    let Some(caps) = RE_GENRE_SEGMENT.captures(subtitle) else {
        return (String::new(), Vec::new());
    };
    let text = caps[1].trim().to_string();
    let genres = text.split_whitespace().map(str::to_string).collect();
    (text, genres)
}

/// Region by substring search; domestic wins over Japan.
pub fn region(subtitle: &str) -> Region {
    if subtitle.contains(DOMESTIC_MARKER) {
        Region::Domestic
    } else if subtitle.contains(JAPAN_MARKER) {
        Region::Japan
    } else {
        Region::Other
    }
}
