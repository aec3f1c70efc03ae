// src/pipeline/deliver.rs

//! Delivery pump.
//!
//! Sends posts one at a time, oldest first, and moves the watermark to each
//! post right after its send succeeds. The first failure ends the run so a
//! later post can never be recorded ahead of an undelivered one.

use std::time::Duration;

use crate::error::AppError;
use crate::models::{Post, Watermark};
use crate::sink::Sink;
use crate::storage::WatermarkStore;

/// Outcome of one delivery run.
#[derive(Debug)]
pub struct DeliveryReport {
    /// Posts handed to the sink (including a failed one)
    pub attempted: usize,
    /// Posts the sink accepted
    pub delivered: usize,
    /// Watermark after the run
    pub watermark: Watermark,
    /// First failure, if the run stopped early
    pub error: Option<AppError>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Deliver `posts` (oldest first) through `sink`, advancing `store` per post.
///
/// `start` is the watermark the posts were selected against. Consecutive
/// sends are separated by `send_delay`, whatever the sink.
pub async fn deliver(
    posts: &[Post],
    sink: &dyn Sink,
    store: &dyn WatermarkStore,
    start: Watermark,
    send_delay: Duration,
) -> DeliveryReport {
    let mut report = DeliveryReport {
        attempted: 0,
        delivered: 0,
        watermark: start,
        error: None,
    };

    for (i, post) in posts.iter().enumerate() {
        if i > 0 && !send_delay.is_zero() {
            tokio::time::sleep(send_delay).await;
        }

        report.attempted += 1;
        if let Err(e) = sink.deliver(post).await {
            log::warn!("{} failed for {}: {}", sink.name(), post.uri, e);
            report.error = Some(e);
            break;
        }
        report.delivered += 1;
        log::info!(
            "Delivered post by @{} from {} via {}",
            post.author_handle,
            post.indexed_at.to_rfc3339(),
            sink.name()
        );

        let next = Watermark::of(post);
        if next <= report.watermark {
            log::debug!("{} is not newer than {}; watermark unchanged", post.uri, report.watermark);
            continue;
        }
        if let Err(e) = store.save(next).await {
            log::error!(
                "Delivered {} but could not record it in {}: {}",
                post.uri,
                store.location(),
                e
            );
            report.error = Some(e);
            break;
        }
        report.watermark = next;
    }

    report
}
