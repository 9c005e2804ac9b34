//! Resource Pager
//!
//! Wraps the two-phase listing the API requires (playlist pages of video
//! ids, then batched detail fetches) into a single sequence of
//! [`VideoRecord`]s. Any page failure is terminal: callers always see the
//! error rather than a silently truncated listing.

use crate::error::ApiError;
use crate::youtube::client::{VideoRecord, YouTubeClient};
use futures::stream::{self, Stream, TryStreamExt};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default page size for playlist listing (the API maximum)
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Quota units charged per list call
pub const LIST_COST: u64 = 1;

enum PageState {
    Start,
    Paging {
        playlist_id: String,
        page_token: Option<String>,
    },
    Done,
}

/// Paginated fetch of all videos on the authenticated channel.
///
/// Restartable: each call to [`fetch_all`](Self::fetch_all) or
/// [`stream`](Self::stream) re-issues requests from the beginning.
pub struct ResourcePager {
    client: YouTubeClient,
    page_size: usize,
    units_consumed: AtomicU64,
}

impl ResourcePager {
    pub fn new(client: YouTubeClient) -> Self {
        Self::with_page_size(client, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(client: YouTubeClient, page_size: usize) -> Self {
        Self {
            client,
            page_size: page_size.clamp(1, DEFAULT_PAGE_SIZE),
            units_consumed: AtomicU64::new(0),
        }
    }

    /// Cumulative quota units consumed by list calls across this pager's
    /// lifetime. Observability only; write budgeting lives in the mutator.
    pub fn units_consumed(&self) -> u64 {
        self.units_consumed.load(Ordering::Relaxed)
    }

    fn charge(&self, units: u64) {
        self.units_consumed.fetch_add(units, Ordering::Relaxed);
    }

    /// Lazily yield every video on the channel, page by page
    pub fn stream(&self) -> impl Stream<Item = Result<VideoRecord, ApiError>> + '_ {
        stream::try_unfold(PageState::Start, move |state| async move {
            let (playlist_id, page_token) = match state {
                PageState::Start => {
                    self.charge(LIST_COST);
                    let playlist_id = self.client.uploads_playlist_id().await?;
                    tracing::debug!(%playlist_id, "resolved uploads playlist");
                    (playlist_id, None)
                }
                PageState::Paging {
                    playlist_id,
                    page_token,
                } => (playlist_id, page_token),
                PageState::Done => return Ok(None),
            };

            self.charge(LIST_COST);
            let page = self
                .client
                .playlist_page(&playlist_id, page_token.as_deref(), self.page_size)
                .await?;

            if !page.video_ids.is_empty() {
                self.charge(LIST_COST);
            }
            let records = self.client.videos_batch(&page.video_ids).await?;
            tracing::debug!(
                videos = records.len(),
                has_next = page.next_page_token.is_some(),
                "fetched page"
            );

            let next = match page.next_page_token {
                Some(token) => PageState::Paging {
                    playlist_id,
                    page_token: Some(token),
                },
                None => PageState::Done,
            };

            Ok(Some((records, next)))
        })
        .map_ok(|batch| stream::iter(batch.into_iter().map(Ok)))
        .try_flatten()
    }

    /// Fetch every video on the channel into memory
    pub async fn fetch_all(&self) -> Result<Vec<VideoRecord>, ApiError> {
        let records: Vec<VideoRecord> = self.stream().try_collect().await?;
        tracing::info!(
            videos = records.len(),
            units = self.units_consumed(),
            "channel listing complete"
        );
        Ok(records)
    }
}
