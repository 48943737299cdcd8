use crate::error::{AppError, Result};
use crate::models::{SavedTrack, UserProfile};
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Client for the streaming service's Web API, authenticated with one
/// account's bearer token. Each run builds its own instance per role.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    api_base: String,
    token: String,
    client: Client,
}

/// One page of the saved-tracks listing. `item_count` is the raw number of
/// items the API returned (pagination terminates on an empty page);
/// `tracks` excludes items with a null underlying track.
#[derive(Debug)]
pub struct SavedTracksPage {
    pub tracks: Vec<SavedTrack>,
    pub item_count: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
struct SavedTracksResponse {
    items: Vec<SavedItem>,
    total: usize,
}

#[derive(Debug, Deserialize)]
struct SavedItem {
    added_at: DateTime<Utc>,
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    // Null for local uploads; those items are skipped like null tracks.
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistObject>,
    album: AlbumObject,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    name: String,
    #[serde(default)]
    images: Vec<ImageObject>,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: String,
}

#[derive(Debug, Deserialize)]
struct UserObject {
    id: String,
    display_name: Option<String>,
    #[serde(default)]
    images: Vec<ImageObject>,
}

impl SavedItem {
    fn into_record(self) -> Option<SavedTrack> {
        let track = self.track?;
        let id = track.id?;

        Some(SavedTrack {
            id,
            name: track.name,
            artists: track
                .artists
                .into_iter()
                .map(|a| a.name)
                .collect::<Vec<_>>()
                .join(", "),
            album: track.album.name,
            image_url: track.album.images.into_iter().next().map(|i| i.url),
            added_at: self.added_at,
        })
    }
}

impl SpotifyClient {
    pub fn new(api_base: String, token: String) -> Self {
        Self {
            api_base,
            token,
            client: Client::new(),
        }
    }

    /// GET /me - profile of the account this token belongs to.
    pub async fn current_user(&self) -> Result<UserProfile> {
        let url = format!("{}/me", self.api_base);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AppError::Spotify(format!("Request failed: {}", e)))?;
        let response = Self::ensure_success(response, "current_user").await?;

        let user: UserObject = response
            .json()
            .await
            .map_err(|e| AppError::Spotify(format!("Failed to parse profile: {}", e)))?;

        Ok(UserProfile {
            display_name: user.display_name.unwrap_or_else(|| user.id.clone()),
            id: user.id,
            image_url: user.images.into_iter().next().map(|i| i.url),
        })
    }

    /// GET /me/tracks - one page of the saved-tracks library.
    pub async fn saved_tracks_page(&self, limit: usize, offset: usize) -> Result<SavedTracksPage> {
        let url = format!("{}/me/tracks", self.api_base);

        tracing::debug!("Fetching saved tracks: limit={} offset={}", limit, offset);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())])
            .send()
            .await
            .map_err(|e| AppError::Spotify(format!("Request failed: {}", e)))?;
        let response = Self::ensure_success(response, "saved_tracks").await?;

        let page: SavedTracksResponse = response
            .json()
            .await
            .map_err(|e| AppError::Spotify(format!("Failed to parse saved tracks: {}", e)))?;

        let item_count = page.items.len();
        let tracks = page
            .items
            .into_iter()
            .filter_map(SavedItem::into_record)
            .collect();

        Ok(SavedTracksPage {
            tracks,
            item_count,
            total: page.total,
        })
    }

    /// PUT /me/tracks - save a single track to the library. One call per
    /// track keeps the destination's insertion-time ordering under our
    /// control.
    pub async fn save_track(&self, id: &str) -> Result<()> {
        self.put_saved_tracks(&[id.to_string()]).await
    }

    /// PUT /me/tracks - save up to a page of tracks in one call. Order of
    /// insertion within the batch is up to the server.
    pub async fn save_tracks(&self, ids: &[String]) -> Result<()> {
        self.put_saved_tracks(ids).await
    }

    async fn put_saved_tracks(&self, ids: &[String]) -> Result<()> {
        let url = format!("{}/me/tracks", self.api_base);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "ids": ids }))
            .send()
            .await
            .map_err(|e| AppError::Spotify(format!("Request failed: {}", e)))?;
        Self::ensure_success(response, "save_tracks").await?;

        Ok(())
    }

    async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(Self::rate_limited(&response));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Spotify API error on {}: {} - {}", what, status, body);
            return Err(AppError::Spotify(format!(
                "{} returned status {}: {}",
                what, status, body
            )));
        }

        Ok(response)
    }

    fn rate_limited(response: &reqwest::Response) -> AppError {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        AppError::RateLimited { retry_after }
    }
}
