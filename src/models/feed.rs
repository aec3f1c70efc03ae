//! Source-neutral feed page structures.

use serde::{Deserialize, Serialize};

/// One entry of an author feed page, as reported by the feed source.
///
/// Fields are kept in their source-native form; the timestamp is still a
/// string here and only becomes an ordering key once converted into a
/// [`Post`](super::Post).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedEntry {
    /// Source-native resource identifier (an `at://` URI on Bluesky)
    pub uri: String,

    /// Author handle
    pub author_handle: String,

    /// Author display name, if set
    #[serde(default)]
    pub author_display_name: Option<String>,

    /// Author avatar URL, if set
    #[serde(default)]
    pub author_avatar: Option<String>,

    /// Post body text
    pub text: String,

    /// Whether the post carries media or a quoted record
    #[serde(default)]
    pub has_embed: bool,

    /// ISO-8601 timestamp at which the source indexed the post
    pub indexed_at: String,
}

/// A page of entries, newest first, with the cursor for the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,

    /// Opaque cursor for the next (older) page; `None` at the end of the timeline
    pub cursor: Option<String>,
}

impl FeedPage {
    pub fn new(entries: Vec<FeedEntry>, cursor: Option<String>) -> Self {
        Self { entries, cursor }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
