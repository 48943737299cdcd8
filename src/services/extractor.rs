use crate::config::Pacing;
use crate::error::AppError;
use crate::models::ExtractEvent;
use crate::services::spotify::SpotifyClient;
use futures::stream::Stream;

/// Walk the source account's saved-tracks library page by page, yielding
/// progress events as they happen. The stream is lazy: nothing is fetched
/// until the caller polls, and dropping it cancels the run at the next
/// suspension point.
///
/// Terminates with `Complete { count }` after an empty page, or with a
/// single `Error` event (and no `Complete`) on any non-rate-limit failure.
pub fn extract_all(client: SpotifyClient, pacing: Pacing) -> impl Stream<Item = ExtractEvent> {
    async_stream::stream! {
        let mut offset = 0usize;
        let mut total: Option<usize> = None;
        let mut emitted = 0usize;

        loop {
            let page = match client.saved_tracks_page(pacing.page_size, offset).await {
                Ok(page) => page,
                Err(AppError::RateLimited { retry_after }) => {
                    let wait = retry_after.unwrap_or(pacing.default_retry_after);
                    tracing::warn!(
                        "Rate limited at offset {}, backing off {}s",
                        offset,
                        wait.as_secs()
                    );
                    yield ExtractEvent::RateLimited { retry_after_secs: wait.as_secs() };
                    tokio::time::sleep(wait).await;
                    // Retry the same offset; the failed attempt doesn't advance
                    continue;
                }
                Err(e) => {
                    tracing::error!("Extraction aborted at offset {}: {}", offset, e);
                    yield ExtractEvent::Error { message: e.to_string() };
                    return;
                }
            };

            if total.is_none() {
                total = Some(page.total);
                tracing::info!("Source library reports {} saved tracks", page.total);
                yield ExtractEvent::Total { total: page.total };
            }
            let library_total = total.unwrap_or(0);

            // An empty page ends pagination even when the reported total
            // says otherwise (the count can drift while we walk).
            if page.item_count == 0 {
                break;
            }

            for record in page.tracks {
                emitted += 1;
                yield ExtractEvent::Track { record };
            }

            offset += pacing.page_size;
            yield ExtractEvent::Progress {
                fetched: offset.min(library_total),
                total: library_total,
            };

            tokio::time::sleep(pacing.page_delay).await;
        }

        tracing::info!("Extraction complete: {} tracks captured", emitted);
        yield ExtractEvent::Complete { count: emitted };
    }
}
