//! In-process watermark store.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::Watermark;
use crate::storage::WatermarkStore;

/// Watermark store that lives only as long as the process.
///
/// Keeps the full history of saves so callers can inspect how the
/// watermark moved.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    history: Mutex<Vec<Watermark>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-delivered instant.
    pub fn starting_at(watermark: Watermark) -> Self {
        Self {
            history: Mutex::new(vec![watermark]),
        }
    }

    /// Every watermark held so far, oldest first, including the starting one.
    pub fn history(&self) -> Vec<Watermark> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn current(&self) -> Watermark {
        self.history().last().copied().unwrap_or_default()
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn load(&self) -> Result<Watermark> {
        Ok(self.current())
    }

    async fn save(&self, watermark: Watermark) -> Result<()> {
        let mut history = self
            .history
            .lock()
            .map_err(|_| AppError::watermark("memory store lock poisoned"))?;
        history.push(watermark);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
