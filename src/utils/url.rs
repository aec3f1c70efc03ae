// src/utils/url.rs

//! Resource identifier to viewer URL conversion.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Record collection holding posts.
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

static AT_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^at://(?P<authority>[A-Za-z0-9._:%-]+)/(?P<collection>[A-Za-z0-9.-]+)/(?P<rkey>[A-Za-z0-9._:~-]+)$")
        .expect("AT-URI pattern is valid")
});

/// Outcome of deriving a viewer URL from a resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostUrl {
    /// Canonical viewer URL of the post
    Url(String),
    /// Well-formed identifier of some other record type
    NotAPost,
    /// Not a parseable record identifier
    Malformed,
}

impl PostUrl {
    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    pub fn into_url(self) -> Option<String> {
        match self {
            Self::Url(url) => Some(url),
            Self::NotAPost | Self::Malformed => None,
        }
    }
}

impl fmt::Display for PostUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::NotAPost => f.write_str("not a post record"),
            Self::Malformed => f.write_str("malformed record identifier"),
        }
    }
}

/// Derive the viewer URL of a post from its `at://` identifier.
///
/// # Examples
/// ```
/// use skyrelay::utils::url::{post_url, PostUrl};
///
/// assert_eq!(
///     post_url("at://did:plc:abc/app.bsky.feed.post/3kabc", "https://bsky.app"),
///     PostUrl::Url("https://bsky.app/profile/did:plc:abc/post/3kabc".to_string())
/// );
/// assert_eq!(
///     post_url("at://did:plc:abc/app.bsky.feed.like/3kabc", "https://bsky.app"),
///     PostUrl::NotAPost
/// );
/// assert_eq!(post_url("https://bsky.app", "https://bsky.app"), PostUrl::Malformed);
/// ```
pub fn post_url(uri: &str, viewer_url: &str) -> PostUrl {
    let Some(caps) = AT_URI.captures(uri.trim()) else {
        return PostUrl::Malformed;
    };

    if &caps["collection"] != POST_COLLECTION {
        return PostUrl::NotAPost;
    }

    PostUrl::Url(format!(
        "{}/profile/{}/post/{}",
        viewer_url.trim_end_matches('/'),
        &caps["authority"],
        &caps["rkey"]
    ))
}
