use crate::config::Pacing;
use crate::error::AppError;
use crate::models::{SavedTrack, TransferEvent};
use crate::services::spotify::SpotifyClient;
use futures::stream::Stream;

/// Replay a captured snapshot into the destination library.
///
/// The destination API has no user-settable timestamp; it orders liked
/// items by server-side insertion time. In ordered mode tracks are
/// therefore inserted oldest-first, one call at a time, so each insert
/// lands above the previous one and the source's chronological order is
/// reproduced. No deduplication happens here: re-running a transfer
/// re-inserts every track, and what the destination does with a duplicate
/// is its own business.
pub fn transfer(
    client: SpotifyClient,
    tracks: Vec<SavedTrack>,
    pacing: Pacing,
    preserve_order: bool,
) -> impl Stream<Item = TransferEvent> {
    async_stream::stream! {
        let total = tracks.len();
        let mut transferred = 0usize;

        if preserve_order {
            let mut ordered = tracks;
            // Stable: equal timestamps keep their snapshot order
            ordered.sort_by(|a, b| a.added_at.cmp(&b.added_at));

            for track in ordered {
                let mut outcome = client.save_track(&track.id).await;

                if let Err(AppError::RateLimited { retry_after }) = &outcome {
                    let wait = (*retry_after).unwrap_or(pacing.default_retry_after);
                    tracing::warn!(
                        "Rate limited inserting '{}', backing off {}s",
                        track.name,
                        wait.as_secs()
                    );
                    yield TransferEvent::RateLimited { retry_after_secs: wait.as_secs() };
                    tokio::time::sleep(wait).await;
                    // Exactly one retry; a second rate limit falls through
                    // below as a per-item failure
                    outcome = client.save_track(&track.id).await;
                }

                match outcome {
                    Ok(()) => {
                        transferred += 1;
                        if transferred % pacing.progress_interval == 0 || transferred == total {
                            yield TransferEvent::Progress {
                                transferred,
                                total,
                                percent: (transferred * 100 / total) as u32,
                                current_track: Some(track.name.clone()),
                            };
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Skipping '{}': {}", track.name, e);
                        yield TransferEvent::Error {
                            message: e.to_string(),
                            context: track.name.clone(),
                        };
                    }
                }

                // After every attempt, not just successes. The pause lets
                // the destination index settle between inserts, which is
                // what keeps the resulting order deterministic.
                tokio::time::sleep(pacing.insert_delay).await;
            }
        } else {
            for (i, batch) in tracks.chunks(pacing.batch_size).enumerate() {
                let start = i * pacing.batch_size;
                let ids: Vec<String> = batch.iter().map(|t| t.id.clone()).collect();

                match client.save_tracks(&ids).await {
                    Ok(()) => {
                        transferred += batch.len();
                        yield TransferEvent::Progress {
                            transferred,
                            total,
                            percent: (transferred * 100 / total) as u32,
                            current_track: None,
                        };
                    }
                    Err(e) => {
                        tracing::warn!("Batch starting at index {} failed: {}", start, e);
                        yield TransferEvent::Error {
                            message: e.to_string(),
                            context: format!("batch {}", start),
                        };
                    }
                }

                tokio::time::sleep(pacing.batch_delay).await;
            }
        }

        tracing::info!("Transfer complete: {}/{} tracks", transferred, total);
        yield TransferEvent::Complete { transferred, total };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn track(id: &str, name: &str, added_at: &str) -> SavedTrack {
        SavedTrack {
            id: id.to_string(),
            name: name.to_string(),
            artists: "Artist".to_string(),
            album: "Album".to_string(),
            image_url: None,
            added_at: added_at.parse().unwrap(),
        }
    }

    fn numbered_tracks(n: usize) -> Vec<SavedTrack> {
        (0..n)
            .map(|i| SavedTrack {
                id: format!("t{}", i),
                name: format!("Track {}", i),
                artists: "Artist".to_string(),
                album: "Album".to_string(),
                image_url: None,
                added_at: Utc
                    .with_ymd_and_hms(2024, 1, 1, (i / 3600) as u32, ((i / 60) % 60) as u32, (i % 60) as u32)
                    .unwrap(),
            })
            .collect()
    }

    async fn mount_accept_all(server: &MockServer) {
        Mock::given(method("PUT"))
            .and(path("/me/tracks"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    async fn run(
        server: &MockServer,
        tracks: Vec<SavedTrack>,
        preserve_order: bool,
    ) -> Vec<TransferEvent> {
        let client = SpotifyClient::new(server.uri(), "tok".to_string());
        transfer(client, tracks, Pacing::zero(), preserve_order)
            .collect()
            .await
    }

    fn inserted_ids(requests: &[Request]) -> Vec<Vec<String>> {
        requests
            .iter()
            .filter(|r| r.method.to_string() == "PUT")
            .map(|r| {
                let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
                body["ids"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|v| v.as_str().unwrap().to_string())
                    .collect()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_ordered_mode_inserts_oldest_first() {
        let server = MockServer::start().await;
        mount_accept_all(&server).await;

        // Snapshot arrives newest-first, as extraction produced it
        let tracks = vec![
            track("id3", "Third", "2024-01-03T00:00:00Z"),
            track("id1", "First", "2024-01-01T00:00:00Z"),
            track("id2", "Second", "2024-01-02T00:00:00Z"),
        ];

        let events = run(&server, tracks, true).await;

        let calls = inserted_ids(&server.received_requests().await.unwrap());
        assert_eq!(
            calls,
            vec![vec!["id1".to_string()], vec!["id2".to_string()], vec!["id3".to_string()]]
        );

        assert!(matches!(
            events.last(),
            Some(TransferEvent::Complete { transferred: 3, total: 3 })
        ));
    }

    #[tokio::test]
    async fn test_stable_sort_keeps_snapshot_order_on_ties() {
        let server = MockServer::start().await;
        mount_accept_all(&server).await;

        let tracks = vec![
            track("first-of-pair", "A", "2024-01-01T00:00:00Z"),
            track("second-of-pair", "B", "2024-01-01T00:00:00Z"),
        ];

        run(&server, tracks, true).await;

        let calls = inserted_ids(&server.received_requests().await.unwrap());
        assert_eq!(calls[0], vec!["first-of-pair".to_string()]);
        assert_eq!(calls[1], vec!["second-of-pair".to_string()]);
    }

    #[tokio::test]
    async fn test_progress_every_tenth_and_final() {
        let server = MockServer::start().await;
        mount_accept_all(&server).await;

        let events = run(&server, numbered_tracks(95), true).await;

        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Progress { transferred, percent, .. } => {
                    Some((*transferred, *percent))
                }
                _ => None,
            })
            .collect();

        // 9 periodic events plus the final item
        assert_eq!(progress.len(), 10);
        assert_eq!(progress[0], (10, 10));
        assert_eq!(progress[8], (90, 94));
        assert_eq!(progress[9], (95, 100));

        let completes: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, TransferEvent::Complete { .. }))
            .collect();
        assert_eq!(completes.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_once_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/me/tracks"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_accept_all(&server).await;

        let tracks = vec![
            track("id1", "First", "2024-01-01T00:00:00Z"),
            track("id2", "Second", "2024-01-02T00:00:00Z"),
        ];

        let events = run(&server, tracks, true).await;

        assert!(matches!(
            events[0],
            TransferEvent::RateLimited { retry_after_secs: 0 }
        ));
        assert!(!events.iter().any(|e| matches!(e, TransferEvent::Error { .. })));
        assert!(matches!(
            events.last(),
            Some(TransferEvent::Complete { transferred: 2, total: 2 })
        ));

        // Original attempt + retry + second track
        let calls = inserted_ids(&server.received_requests().await.unwrap());
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn test_second_rate_limit_becomes_item_error() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/me/tracks"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_accept_all(&server).await;

        let tracks = vec![track("id1", "Stubborn", "2024-01-01T00:00:00Z")];

        let events = run(&server, tracks, true).await;

        // One rate-limit event for the first 429; the retry's 429 is the
        // item's failure, not another backoff
        let rate_limits = events
            .iter()
            .filter(|e| matches!(e, TransferEvent::RateLimited { .. }))
            .count();
        assert_eq!(rate_limits, 1);

        assert!(events.iter().any(|e| matches!(
            e,
            TransferEvent::Error { context, .. } if context == "Stubborn"
        )));
        assert!(matches!(
            events.last(),
            Some(TransferEvent::Complete { transferred: 0, total: 1 })
        ));
    }

    #[tokio::test]
    async fn test_item_failure_skipped_and_counted_honestly() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/me/tracks"))
            .and(body_json(json!({ "ids": ["id2"] })))
            .respond_with(ResponseTemplate::new(403).set_body_string("nope"))
            .mount(&server)
            .await;
        mount_accept_all(&server).await;

        let tracks = vec![
            track("id1", "First", "2024-01-01T00:00:00Z"),
            track("id2", "Second", "2024-01-02T00:00:00Z"),
            track("id3", "Third", "2024-01-03T00:00:00Z"),
        ];

        let events = run(&server, tracks, true).await;

        assert!(events.iter().any(|e| matches!(
            e,
            TransferEvent::Error { context, .. } if context == "Second"
        )));
        assert!(matches!(
            events.last(),
            Some(TransferEvent::Complete { transferred: 2, total: 3 })
        ));
    }

    #[tokio::test]
    async fn test_duplicates_are_not_deduplicated() {
        let server = MockServer::start().await;
        mount_accept_all(&server).await;

        let tracks = vec![
            track("same", "Twice", "2024-01-01T00:00:00Z"),
            track("same", "Twice", "2024-01-02T00:00:00Z"),
        ];

        let events = run(&server, tracks, true).await;

        let calls = inserted_ids(&server.received_requests().await.unwrap());
        assert_eq!(calls.len(), 2);
        assert!(matches!(
            events.last(),
            Some(TransferEvent::Complete { transferred: 2, total: 2 })
        ));
    }

    #[tokio::test]
    async fn test_batch_mode_chunks_and_reports_per_batch() {
        let server = MockServer::start().await;
        mount_accept_all(&server).await;

        let events = run(&server, numbered_tracks(120), false).await;

        let calls = inserted_ids(&server.received_requests().await.unwrap());
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].len(), 50);
        assert_eq!(calls[1].len(), 50);
        assert_eq!(calls[2].len(), 20);

        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Progress { transferred, current_track, .. } => {
                    Some((*transferred, current_track.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[2], (120, None));

        assert!(matches!(
            events.last(),
            Some(TransferEvent::Complete { transferred: 120, total: 120 })
        ));
    }

    #[tokio::test]
    async fn test_empty_snapshot_completes_immediately() {
        let server = MockServer::start().await;
        mount_accept_all(&server).await;

        let events = run(&server, Vec::new(), true).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            TransferEvent::Complete { transferred: 0, total: 0 }
        ));
    }
}
