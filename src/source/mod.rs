//! Feed sources.
//!
//! A source serves an account's author feed as pages of [`FeedEntry`]
//! values, newest first, linked by an opaque cursor.
//!
//! [`FeedEntry`]: crate::models::FeedEntry

pub mod bluesky;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::FeedPage;

pub use bluesky::BlueskyClient;

/// Trait for author feed providers.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch one page of `actor`'s feed, starting after `cursor`.
    async fn get_author_feed(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<FeedPage>;

    /// Source name for logs.
    fn name(&self) -> &str;
}
