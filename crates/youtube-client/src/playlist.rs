use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::YouTubeError;

const BASE_URL: &str = "https://www.googleapis.com";

#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl YouTubeConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("YOUTUBE_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            ..Self::default()
        }
    }
}

/// One upload from a channel's uploads playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelVideo {
    pub video_id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    thumbnails: Thumbnails,
    resource_id: ResourceId,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: String,
}

/// The uploads playlist of a channel shares its id with a `UU` prefix instead of `UC`.
pub fn uploads_playlist_id(channel_id: &str) -> String {
    match channel_id.strip_prefix("UC") {
        Some(rest) => format!("UU{rest}"),
        None => channel_id.to_string(),
    }
}

/// Minimal YouTube Data API client: newest uploads of a channel.
#[derive(Clone)]
pub struct YouTubeClient {
    client: Client,
    config: YouTubeConfig,
}

impl YouTubeClient {
    pub fn new(config: YouTubeConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    pub fn from_env() -> Self {
        Self::new(YouTubeConfig::from_env())
    }

    /// Newest uploads first, at most `max_results`.
    pub async fn latest_uploads(
        &self,
        channel_id: &str,
        max_results: u32,
    ) -> Result<Vec<ChannelVideo>, YouTubeError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(YouTubeError::MissingApiKey)?;

        let response = self
            .client
            .get(format!(
                "{}/youtube/v3/playlistItems",
                self.config.base_url.trim_end_matches('/')
            ))
            .query(&[
                ("part", "snippet"),
                ("playlistId", uploads_playlist_id(channel_id).as_str()),
                ("maxResults", max_results.to_string().as_str()),
                ("key", api_key),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(YouTubeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let page: PlaylistItemsResponse = response.json().await?;
        Ok(page
            .items
            .into_iter()
            .map(|item| {
                let s = item.snippet;
                ChannelVideo {
                    video_id: s.resource_id.video_id,
                    title: s.title,
                    thumbnail: s.thumbnails.medium.or(s.thumbnails.default).map(|t| t.url),
                    published_at: s.published_at,
                }
            })
            .collect())
    }
}
