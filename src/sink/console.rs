//! Console sink for dry runs.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Post;
use crate::sink::Sink;

/// Prints each post to stdout instead of sending it anywhere.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    viewer_url: String,
}

impl ConsoleSink {
    pub fn new(viewer_url: &str) -> Self {
        Self {
            viewer_url: viewer_url.to_string(),
        }
    }

    /// Render the block printed for a post.
    pub fn render(&self, post: &Post) -> String {
        let mut out = format!("Post: {post}");
        out.push_str(&format!(
            "\n    author:  {} <{}>",
            post.author_name(),
            post.profile_url(&self.viewer_url)
        ));
        if let Some(url) = &post.post_url {
            out.push_str(&format!("\n    link:    {url}"));
        }
        out
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn deliver(&self, post: &Post) -> Result<()> {
        println!("{}", self.render(post));
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
