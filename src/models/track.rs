use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One liked track as captured from the source library. Immutable once
/// fetched; `added_at` is the chronological ordering key for the transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTrack {
    pub id: String,
    pub name: String,
    /// Display list of artist names joined with ", ".
    pub artists: String,
    pub album: String,
    pub image_url: Option<String>,
    pub added_at: DateTime<Utc>,
}
