// src/models/mod.rs

//! Domain models for the relay.
//!
//! This module contains the data structures shared by the feed source,
//! the synchronization pipeline, and the delivery sinks.

mod config;
mod feed;
mod post;
mod watermark;

// Re-export all public types
pub use config::{
    AccountConfig, Config, DeliveryConfig, MIN_PAGE_DELAY_MS, MIN_SEND_DELAY_MS, PollConfig,
    SourceConfig, StorageConfig, env,
};
pub use feed::{FeedEntry, FeedPage};
pub use post::{Post, parse_indexed_at};
pub use watermark::{WATERMARK_KEY, Watermark};
