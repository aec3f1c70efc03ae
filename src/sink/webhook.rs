// src/sink/webhook.rs

//! Webhook sink.
//!
//! Posts one Discord-compatible embed message per post.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{DeliveryConfig, Post, SourceConfig};
use crate::sink::Sink;
use crate::utils::{http, truncate_chars};

const MAX_AUTHOR_NAME: usize = 256;
const MAX_DESCRIPTION: usize = 4_096;

#[derive(Clone)]
pub struct WebhookSink {
    url: String,
    client: Client,
    viewer_url: String,
    username: Option<String>,
    max_retries: u8,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, client: Client, viewer_url: &str) -> Self {
        Self {
            url: url.into(),
            client,
            viewer_url: viewer_url.to_string(),
            username: None,
            max_retries: 0,
        }
    }

    pub fn from_config(url: &str, delivery: &DeliveryConfig, source: &SourceConfig) -> Result<Self> {
        let client = http::create_async_client(source)?;
        Ok(Self::new(url, client, &source.viewer_url)
            .with_username(delivery.username.clone())
            .with_retries(delivery.retries))
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Build the message body for a post.
    pub fn payload(&self, post: &Post) -> WebhookPayload {
        let description = (!post.content.trim().is_empty())
            .then(|| truncate_chars(&post.content, MAX_DESCRIPTION));

        WebhookPayload {
            username: self.username.clone(),
            embeds: vec![Embed {
                author: EmbedAuthor {
                    name: truncate_chars(
                        &format!("{} (@{})", post.author_name(), post.author_handle),
                        MAX_AUTHOR_NAME,
                    ),
                    url: post.profile_url(&self.viewer_url),
                    icon_url: post.author_avatar_url.clone(),
                },
                description,
                url: post.post_url.clone(),
                timestamp: post.indexed_at.to_rfc3339(),
                footer: post.has_embed.then(|| EmbedFooter {
                    text: "Contains media or a quoted post".to_string(),
                }),
            }],
        }
    }

    async fn post_once(&self, payload: &WebhookPayload) -> std::result::Result<(), String> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(format!("HTTP {status}: {}", truncate_chars(body.trim(), 200)))
    }
}

#[async_trait]
impl Sink for WebhookSink {
    async fn deliver(&self, post: &Post) -> Result<()> {
        let payload = self.payload(post);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.post_once(&payload).await {
                Ok(()) => return Ok(()),
                Err(message) if attempt <= u32::from(self.max_retries) => {
                    let wait: Duration = http::backoff(attempt);
                    log::warn!(
                        "Webhook attempt {} for {} failed: {}; retrying in {:?}",
                        attempt,
                        post.uri,
                        message,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(message) => return Err(AppError::delivery(&post.uri, message)),
            }
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    author: EmbedAuthor,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<EmbedFooter>,
}

#[derive(Debug, Serialize)]
struct EmbedAuthor {
    name: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedEntry;

    fn post(text: &str, has_embed: bool) -> Post {
        Post::from_entry(
            FeedEntry {
                uri: "at://did:plc:abc/app.bsky.feed.post/3k1".to_string(),
                author_handle: "alice.bsky.social".to_string(),
                author_display_name: Some("Alice".to_string()),
                author_avatar: Some("https://cdn.example/a.jpg".to_string()),
                text: text.to_string(),
                has_embed,
                indexed_at: "2024-05-01T12:00:00.250Z".to_string(),
            },
            "https://bsky.app",
        )
        .unwrap()
    }

    fn sink() -> WebhookSink {
        WebhookSink::new("https://hooks.example/abc", Client::new(), "https://bsky.app")
    }

    #[test]
    fn test_payload_shape() {
        let value = serde_json::to_value(sink().payload(&post("hello", false))).unwrap();
        let embed = &value["embeds"][0];

        assert!(value.get("username").is_none());
        assert_eq!(embed["author"]["name"], "Alice (@alice.bsky.social)");
        assert_eq!(embed["author"]["url"], "https://bsky.app/profile/alice.bsky.social");
        assert_eq!(embed["author"]["icon_url"], "https://cdn.example/a.jpg");
        assert_eq!(embed["description"], "hello");
        assert_eq!(embed["url"], "https://bsky.app/profile/did:plc:abc/post/3k1");
        assert_eq!(embed["timestamp"], "2024-05-01T12:00:00.250+00:00");
        assert!(embed.get("footer").is_none());
    }

    #[test]
    fn test_payload_with_media_and_username() {
        let sink = sink().with_username(Some("relay".to_string()));
        let value = serde_json::to_value(sink.payload(&post("  ", true))).unwrap();
        let embed = &value["embeds"][0];

        assert_eq!(value["username"], "relay");
        assert!(embed.get("description").is_none());
        assert_eq!(embed["footer"]["text"], "Contains media or a quoted post");
    }

    #[test]
    fn test_long_text_is_truncated() {
        let long = "x".repeat(5_000);
        let payload = sink().payload(&post(&long, false));
        let description = payload.embeds[0].description.as_deref().unwrap();
        assert_eq!(description.chars().count(), MAX_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_unreachable_target_is_delivery_error() {
        let sink = WebhookSink::new("http://127.0.0.1:9/hook", Client::new(), "https://bsky.app");
        let err = sink.deliver(&post("hi", false)).await.unwrap_err();
        assert!(matches!(err, AppError::Delivery { .. }));
    }
}
