// src/pipeline/paginate.rs

//! Feed pagination.
//!
//! Walks an author feed newest-first until the source runs out of pages or
//! a page reaches back to the watermark. A page left empty by repost
//! filtering is walked past as long as it carries a cursor. Pages may overlap
//! (a retried page can be served twice), so posts are collapsed by identity
//! on the way in.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{FeedPage, Post, SourceConfig, Watermark};
use crate::source::FeedSource;
use crate::utils::http::backoff;

/// Pagination parameters.
#[derive(Debug, Clone)]
pub struct PaginationSettings {
    /// Posts requested per page
    pub page_size: u32,
    /// Pause between page requests
    pub page_delay: Duration,
    /// Extra attempts for a failing page
    pub page_retries: u8,
    /// Stop after this many pages
    pub max_pages: Option<usize>,
    /// Viewer base URL for post links
    pub viewer_url: String,
}

impl From<&SourceConfig> for PaginationSettings {
    fn from(config: &SourceConfig) -> Self {
        Self {
            page_size: config.page_size,
            page_delay: config.page_delay(),
            page_retries: config.page_retries,
            max_pages: config.max_pages(),
            viewer_url: config.viewer_url.clone(),
        }
    }
}

/// Why pagination stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source reported no further cursor
    EndOfTimeline,
    /// The oldest post on the last page is at or before the watermark
    ReachedWatermark,
    /// The configured page limit was hit
    PageLimit,
    /// The source handed back a cursor it had already served
    RepeatedCursor,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::EndOfTimeline => "end of timeline",
            Self::ReachedWatermark => "reached watermark",
            Self::PageLimit => "page limit",
            Self::RepeatedCursor => "repeated cursor",
        };
        f.write_str(text)
    }
}

/// Candidate posts gathered by one pagination run.
#[derive(Debug, Clone)]
pub struct Candidates {
    /// Deduplicated posts, newest first
    pub posts: Vec<Post>,
    /// Pages fetched
    pub pages: usize,
    /// Entries dropped as re-fetched copies
    pub duplicates: usize,
    pub stop: StopReason,
}

/// Fetch candidate posts for `actor` down to `watermark`.
///
/// Any page failure (after retries) or malformed post aborts the whole run;
/// nothing fetched so far is returned.
pub async fn fetch_candidates(
    source: &dyn FeedSource,
    actor: &str,
    watermark: Watermark,
    settings: &PaginationSettings,
) -> Result<Candidates> {
    let mut posts = Vec::new();
    let mut seen_posts = HashSet::new();
    let mut seen_cursors = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;
    let mut duplicates = 0usize;

    let stop = loop {
        if pages > 0 && !settings.page_delay.is_zero() {
            tokio::time::sleep(settings.page_delay).await;
        }

        let page = fetch_page(source, actor, cursor.as_deref(), settings).await?;
        pages += 1;

        let next_cursor = page.cursor;
        let mut oldest: Option<DateTime<Utc>> = None;
        for entry in page.entries {
            let post = Post::from_entry(entry, &settings.viewer_url)?;
            oldest = Some(oldest.map_or(post.indexed_at, |o| o.min(post.indexed_at)));
            if seen_posts.insert(post.identity()) {
                posts.push(post);
            } else {
                duplicates += 1;
            }
        }

        log::debug!(
            "Page {} from {}: {} candidates so far, oldest {:?}",
            pages,
            source.name(),
            posts.len(),
            oldest
        );

        // A page emptied by source-side filtering still has older pages behind it.
        if oldest.is_some_and(|oldest| oldest <= watermark.at()) {
            break StopReason::ReachedWatermark;
        }
        let Some(next) = next_cursor else {
            break StopReason::EndOfTimeline;
        };
        if settings.max_pages.is_some_and(|max| pages >= max) {
            break StopReason::PageLimit;
        }
        if !seen_cursors.insert(next.clone()) {
            break StopReason::RepeatedCursor;
        }
        cursor = Some(next);
    };

    if stop == StopReason::PageLimit {
        log::warn!(
            "Stopped after {} pages without reaching the watermark ({})",
            pages,
            watermark
        );
    }

    Ok(Candidates {
        posts,
        pages,
        duplicates,
        stop,
    })
}

/// Fetch a single page, retrying with backoff on failure.
async fn fetch_page(
    source: &dyn FeedSource,
    actor: &str,
    cursor: Option<&str>,
    settings: &PaginationSettings,
) -> Result<FeedPage> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match source
            .get_author_feed(actor, cursor, settings.page_size)
            .await
        {
            Ok(page) => return Ok(page),
            Err(e) if attempt <= u32::from(settings.page_retries) => {
                let wait = backoff(attempt);
                log::warn!(
                    "Page fetch attempt {} failed: {}; retrying in {:?}",
                    attempt,
                    e,
                    wait
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::test_utils::{ScriptedSource, entry, watermark_at};

    fn settings() -> PaginationSettings {
        PaginationSettings {
            page_size: 30,
            page_delay: Duration::ZERO,
            page_retries: 0,
            max_pages: None,
            viewer_url: "https://bsky.app".to_string(),
        }
    }

    fn times(candidates: &Candidates) -> Vec<i64> {
        candidates
            .posts
            .iter()
            .map(|p| p.indexed_at.timestamp())
            .collect()
    }

    #[tokio::test]
    async fn test_follows_cursor_to_end() {
        let source = ScriptedSource::pages(vec![
            vec![entry(1400), entry(1300)],
            vec![entry(1200), entry(1100)],
        ]);

        let got = fetch_candidates(&source, "alice", Watermark::epoch(), &settings())
            .await
            .unwrap();

        assert_eq!(times(&got), vec![1400, 1300, 1200, 1100]);
        assert_eq!(got.pages, 2);
        assert_eq!(got.stop, StopReason::EndOfTimeline);
        assert_eq!(source.requested_cursors(), vec![None, Some("1".to_string())]);
    }

    #[tokio::test]
    async fn test_stops_at_watermark() {
        let source = ScriptedSource::pages(vec![
            vec![entry(1400), entry(1300)],
            vec![entry(1200), entry(1000)],
            vec![entry(900), entry(800)],
        ]);

        let got = fetch_candidates(&source, "alice", watermark_at(1000), &settings())
            .await
            .unwrap();

        assert_eq!(got.pages, 2);
        assert_eq!(got.stop, StopReason::ReachedWatermark);
        assert_eq!(times(&got), vec![1400, 1300, 1200, 1000]);
    }

    #[tokio::test]
    async fn test_terminates_on_endless_source() {
        let source = ScriptedSource::endless(10_000, 30);

        let got = fetch_candidates(&source, "alice", watermark_at(9_000), &settings())
            .await
            .unwrap();

        assert_eq!(got.stop, StopReason::ReachedWatermark);
        assert!(got.pages <= 35, "fetched {} pages", got.pages);
        assert!(got.posts.iter().any(|p| p.indexed_at.timestamp() <= 9_000));
    }

    #[tokio::test]
    async fn test_refetched_page_is_deduplicated() {
        let source = ScriptedSource::pages(vec![
            vec![entry(1400), entry(1300)],
            vec![entry(1400), entry(1300)],
            vec![entry(1200)],
        ]);

        let got = fetch_candidates(&source, "alice", Watermark::epoch(), &settings())
            .await
            .unwrap();

        assert_eq!(times(&got), vec![1400, 1300, 1200]);
        assert_eq!(got.duplicates, 2);
    }

    #[tokio::test]
    async fn test_page_failure_aborts_run() {
        let source = ScriptedSource::pages(vec![vec![entry(1400)], vec![entry(1300)]])
            .failing_on(1, 1);

        let err = fetch_candidates(&source, "alice", Watermark::epoch(), &settings())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Feed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_failure_is_retried() {
        let source = ScriptedSource::pages(vec![vec![entry(1400)], vec![entry(1300)]])
            .failing_on(1, 1);
        let settings = PaginationSettings {
            page_retries: 1,
            ..settings()
        };

        let got = fetch_candidates(&source, "alice", Watermark::epoch(), &settings)
            .await
            .unwrap();

        assert_eq!(times(&got), vec![1400, 1300]);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_malformed_timestamp_aborts_run() {
        let mut bad = entry(1300);
        bad.indexed_at = "not a time".to_string();
        let source = ScriptedSource::pages(vec![vec![entry(1400), bad]]);

        let err = fetch_candidates(&source, "alice", Watermark::epoch(), &settings())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MalformedPost { .. }));
    }

    #[tokio::test]
    async fn test_page_limit() {
        let source = ScriptedSource::endless(10_000, 10);
        let limited = PaginationSettings {
            max_pages: Some(3),
            ..settings()
        };
        let got = fetch_candidates(&source, "alice", Watermark::epoch(), &limited)
            .await
            .unwrap();
        assert_eq!(got.pages, 3);
        assert_eq!(got.stop, StopReason::PageLimit);
    }

    #[tokio::test]
    async fn test_empty_page_with_cursor_is_walked_past() {
        let source = ScriptedSource::pages(vec![vec![], vec![entry(1400), entry(1300)]]);

        let got = fetch_candidates(&source, "alice", watermark_at(1000), &settings())
            .await
            .unwrap();

        assert_eq!(times(&got), vec![1400, 1300]);
        assert_eq!(got.pages, 2);
        assert_eq!(got.stop, StopReason::EndOfTimeline);
        assert_eq!(source.requested_cursors(), vec![None, Some("1".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_last_page_ends_timeline() {
        let source = ScriptedSource::pages(vec![vec![]]).with_trailing_cursor();

        let got = fetch_candidates(&source, "alice", Watermark::epoch(), &settings())
            .await
            .unwrap();

        assert_eq!(got.stop, StopReason::EndOfTimeline);
        assert_eq!(got.pages, 2);
        assert!(got.posts.is_empty());
    }

    #[tokio::test]
    async fn test_empty_pages_stop_at_page_limit() {
        let source = ScriptedSource::endless(10_000, 0);
        let limited = PaginationSettings {
            max_pages: Some(4),
            ..settings()
        };

        let got = fetch_candidates(&source, "alice", watermark_at(9_000), &limited)
            .await
            .unwrap();

        assert_eq!(got.stop, StopReason::PageLimit);
        assert_eq!(got.pages, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_are_paced() {
        let source = ScriptedSource::pages(vec![vec![entry(1400)], vec![entry(1300)], vec![entry(1200)]]);
        let paced = PaginationSettings {
            page_delay: Duration::from_millis(500),
            ..settings()
        };

        let start = tokio::time::Instant::now();
        fetch_candidates(&source, "alice", Watermark::epoch(), &paced)
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(1_000));
    }
}
