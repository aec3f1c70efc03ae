//! Watermark persistence.
//!
//! The store is the single owner of the persisted "last delivered" instant.
//! Only the delivery pump writes to it, and only after a post was delivered.
//!
//! ## State File
//!
//! ```text
//! last_sent_at=1714566600.123456
//! ```
//!
//! A missing or unparseable file reads as the epoch, so the next cycle
//! re-delivers rather than stalling.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Watermark;

// Re-export for convenience
pub use local::FileWatermarkStore;
pub use memory::MemoryWatermarkStore;

/// Trait for watermark storage backends.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Load the current watermark.
    ///
    /// Absent or corrupt state yields [`Watermark::epoch`]. Errors are
    /// reserved for storage that exists but cannot be read at all.
    async fn load(&self) -> Result<Watermark>;

    /// Persist `watermark`. Returns only once the write is durable.
    async fn save(&self, watermark: Watermark) -> Result<()>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}
