//! Post data structure.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::FeedEntry;
use crate::utils::url::post_url;

/// A post selected from an author feed. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    /// Source-native resource identifier
    pub uri: String,

    /// Author handle (e.g. `alice.bsky.social`)
    pub author_handle: String,

    /// Author display name
    pub author_display_name: Option<String>,

    /// Author avatar URL
    pub author_avatar_url: Option<String>,

    /// Post body text
    pub content: String,

    /// Whether the post carries media or a quoted record
    pub has_embed: bool,

    /// Canonical viewer URL; `None` when the URI is not a post record
    pub post_url: Option<String>,

    /// Ordering key, truncated to microseconds
    pub indexed_at: DateTime<Utc>,
}

impl Post {
    /// Build a post from a feed entry.
    ///
    /// Fails with [`AppError::MalformedPost`] when `indexed_at` does not parse.
    pub fn from_entry(entry: FeedEntry, viewer_url: &str) -> Result<Self> {
        let indexed_at = parse_indexed_at(&entry.indexed_at)
            .ok_or_else(|| {
                AppError::malformed_post(
                    &entry.uri,
                    format!("unparseable indexed_at '{}'", entry.indexed_at),
                )
            })?;

        let url = post_url(&entry.uri, viewer_url);
        if !url.is_url() {
            log::debug!("No viewer URL for {} ({})", entry.uri, url);
        }

        Ok(Self {
            post_url: url.into_url(),
            uri: entry.uri,
            author_handle: entry.author_handle,
            author_display_name: entry.author_display_name.filter(|n| !n.trim().is_empty()),
            author_avatar_url: entry.author_avatar,
            content: entry.text,
            has_embed: entry.has_embed,
            indexed_at,
        })
    }

    /// Name to show for the author: display name, falling back to the handle.
    pub fn author_name(&self) -> &str {
        self.author_display_name
            .as_deref()
            .unwrap_or(&self.author_handle)
    }

    /// Profile URL of the author on the given viewer.
    pub fn profile_url(&self, viewer_url: &str) -> String {
        format!(
            "{}/profile/{}",
            viewer_url.trim_end_matches('/'),
            self.author_handle
        )
    }

    /// Stable identity used to collapse re-fetched copies of the same post.
    pub fn identity(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.author_handle.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.content.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.indexed_at.timestamp_micros().to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Post by '@{}' at [{}]: '{}' with {}>",
            self.author_handle,
            self.indexed_at.to_rfc3339(),
            self.content,
            if self.has_embed { "embeds" } else { "no embeds" }
        )
    }
}

/// Parse an ISO-8601 timestamp into UTC at microsecond precision.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_indexed_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })?;
    Some(parsed.trunc_subsecs(6))
}
