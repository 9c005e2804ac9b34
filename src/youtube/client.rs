//! YouTube Client
//!
//! Typed calls against the YouTube Data API v3: uploads playlist lookup,
//! playlist item listing, batched video detail fetches, and description
//! updates. The base URL is injectable so integration tests can point the
//! real client at a mock server.

use super::auth::Credentials;
use super::http::YtHttpClient;
use crate::error::ApiError;
use anyhow::{Context, Result};
use serde_json::{json, Value};

/// Production API base
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// A video as fetched from the API.
///
/// The raw snippet is kept alongside the extracted fields because
/// `videos.update` replaces the whole snippet: title, tags and categoryId
/// must be echoed back or they are wiped.
#[derive(Debug, Clone)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub etag: Option<String>,
    pub snippet: Value,
}

impl VideoRecord {
    /// Build a record from a `videos.list` item, or None if the item is
    /// missing the fields every video carries
    pub fn from_api_item(item: &Value) -> Option<Self> {
        let id = item.get("id")?.as_str()?.to_string();
        let snippet = item.get("snippet")?.clone();
        let title = snippet.get("title")?.as_str()?.to_string();
        let description = snippet
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("")
            .to_string();
        let etag = item
            .get("etag")
            .and_then(|e| e.as_str())
            .map(|s| s.to_string());

        Some(Self {
            id,
            title,
            description,
            etag,
            snippet,
        })
    }
}

/// One page of playlist items: video ids plus the continuation token
#[derive(Debug, Clone)]
pub struct PlaylistPage {
    pub video_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Main YouTube API client
#[derive(Clone)]
pub struct YouTubeClient {
    credentials: Credentials,
    http: YtHttpClient,
    base_url: String,
}

impl YouTubeClient {
    /// Create a new client against the production API
    pub async fn new() -> Result<Self> {
        let credentials = Credentials::new()
            .await
            .context("Failed to initialize YouTube credentials")?;
        let http = YtHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Create a client with explicit credentials and base URL (for tests)
    pub fn with_base_url(credentials: Credentials, base_url: &str) -> Result<Self> {
        Ok(Self {
            credentials,
            http: YtHttpClient::new()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    async fn token(&self) -> Result<String, ApiError> {
        self.credentials
            .get_token()
            .await
            .map_err(|e| ApiError::AuthFailure(e.to_string()))
    }

    /// Resolve the authenticated channel's uploads playlist id
    pub async fn uploads_playlist_id(&self) -> Result<String, ApiError> {
        let token = self.token().await?;
        let response = self
            .http
            .get(
                &self.url("channels"),
                &token,
                &[("part", "contentDetails"), ("mine", "true")],
            )
            .await?;

        response
            .get("items")
            .and_then(|v| v.get(0))
            .and_then(|v| v.pointer("/contentDetails/relatedPlaylists/uploads"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ApiError::RemoteRejected {
                code: "channelNotFound".to_string(),
                message: "authenticated account has no channel with an uploads playlist"
                    .to_string(),
            })
    }

    /// Fetch one page of the uploads playlist
    pub async fn playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<PlaylistPage, ApiError> {
        let token = self.token().await?;
        let max_results = page_size.to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token));
        }

        let response = self
            .http
            .get(&self.url("playlistItems"), &token, &query)
            .await?;

        let video_ids = response
            .get("items")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        item.pointer("/snippet/resourceId/videoId")
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string())
                    })
                    .collect()
            })
            .unwrap_or_default();

        let next_page_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(PlaylistPage {
            video_ids,
            next_page_token,
        })
    }

    /// Fetch details for up to 50 videos in one call
    pub async fn videos_batch(&self, ids: &[String]) -> Result<Vec<VideoRecord>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug_assert!(ids.len() <= 50, "videos.list accepts at most 50 ids");

        let token = self.token().await?;
        let joined = ids.join(",");
        let response = self
            .http
            .get(
                &self.url("videos"),
                &token,
                &[("part", "snippet,status"), ("id", joined.as_str())],
            )
            .await?;

        let records = response
            .get("items")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(VideoRecord::from_api_item)
                    .collect()
            })
            .unwrap_or_default();

        Ok(records)
    }

    /// Fetch a single video, or None when the API returns no item for the id
    pub async fn video(&self, id: &str) -> Result<Option<VideoRecord>, ApiError> {
        let records = self.videos_batch(&[id.to_string()]).await?;
        Ok(records.into_iter().next())
    }

    /// Update a video's description, echoing the rest of its snippet
    pub async fn update_description(
        &self,
        record: &VideoRecord,
        new_description: &str,
    ) -> Result<(), ApiError> {
        let token = self.token().await?;

        let mut snippet = record.snippet.clone();
        if let Value::Object(ref mut map) = snippet {
            map.insert(
                "description".to_string(),
                Value::String(new_description.to_string()),
            );
        }

        let body = json!({
            "id": record.id,
            "snippet": snippet,
        });

        self.http
            .put(&self.url("videos"), &token, &[("part", "snippet")], &body)
            .await?;

        tracing::info!(video_id = %record.id, "description updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_api_item_extracts_fields() {
        let item = json!({
            "id": "vid-1",
            "etag": "etag-1",
            "snippet": {
                "title": "My video",
                "description": "hello",
                "categoryId": "22",
                "tags": ["a", "b"]
            }
        });

        let record = VideoRecord::from_api_item(&item).unwrap();
        assert_eq!(record.id, "vid-1");
        assert_eq!(record.title, "My video");
        assert_eq!(record.description, "hello");
        assert_eq!(record.etag.as_deref(), Some("etag-1"));
        assert_eq!(record.snippet["categoryId"], "22");
    }

    #[test]
    fn from_api_item_tolerates_missing_description() {
        let item = json!({
            "id": "vid-2",
            "snippet": { "title": "No description" }
        });

        let record = VideoRecord::from_api_item(&item).unwrap();
        assert_eq!(record.description, "");
    }

    #[test]
    fn from_api_item_rejects_missing_snippet() {
        let item = json!({ "id": "vid-3" });
        assert!(VideoRecord::from_api_item(&item).is_none());
    }
}
