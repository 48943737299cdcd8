use crate::models::SavedTrack;
use serde::{Deserialize, Serialize};

/// Progress update for a library extraction run. Streamed to the client
/// over SSE, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtractEvent {
    /// Emitted exactly once, on the first successful page, with the
    /// API-reported total item count.
    #[serde(rename = "total")]
    Total { total: usize },
    #[serde(rename = "track")]
    Track { record: SavedTrack },
    #[serde(rename = "progress")]
    Progress { fetched: usize, total: usize },
    #[serde(rename = "rate_limited")]
    RateLimited { retry_after_secs: u64 },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "complete")]
    Complete { count: usize },
}

/// Progress update for a transfer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransferEvent {
    #[serde(rename = "progress")]
    Progress {
        transferred: usize,
        total: usize,
        percent: u32,
        /// Name of the most recently inserted track. Absent in batch mode.
        #[serde(skip_serializing_if = "Option::is_none")]
        current_track: Option<String>,
    },
    #[serde(rename = "rate_limited")]
    RateLimited { retry_after_secs: u64 },
    /// Per-item (or per-batch) failure. The run continues; `context` names
    /// the failed track or batch.
    #[serde(rename = "error")]
    Error { message: String, context: String },
    #[serde(rename = "complete")]
    Complete { transferred: usize, total: usize },
}
