//! Delivery sinks.
//!
//! A sink decides what happens to a post once it is selected for delivery:
//! a webhook POST, or a console print for dry runs and setups without a
//! webhook. Every sink reports success the same way so the watermark
//! advances identically for live and dry runs.

pub mod console;
pub mod webhook;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DeliveryConfig, Post, SourceConfig};

pub use console::ConsoleSink;
pub use webhook::WebhookSink;

/// Trait for delivery targets.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver a single post. One outbound write per call.
    async fn deliver(&self, post: &Post) -> Result<()>;

    /// Sink name for logs.
    fn name(&self) -> &str;
}

/// Pick the sink for the given delivery settings.
///
/// Dry runs and configurations without a webhook print to the console.
pub fn from_config(
    delivery: &DeliveryConfig,
    source: &SourceConfig,
    dry_run: bool,
) -> Result<Box<dyn Sink>> {
    match (&delivery.webhook_url, dry_run) {
        (Some(url), false) => Ok(Box::new(WebhookSink::from_config(
            url, delivery, source,
        )?)),
        (Some(_), true) => {
            log::info!("Dry run: webhook configured but posts will only be printed");
            Ok(Box::new(ConsoleSink::new(&source.viewer_url)))
        }
        (None, _) => {
            log::info!("No webhook configured: posts will be printed to the console");
            Ok(Box::new(ConsoleSink::new(&source.viewer_url)))
        }
    }
}
