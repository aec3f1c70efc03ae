// src/pipeline/poll.rs

//! Poll loop.
//!
//! One cycle runs `FETCHING → FILTERING → DELIVERING` and the loop then
//! sleeps a fixed interval before starting over. A failing cycle skips its
//! remaining steps and goes straight to the sleep.

use std::fmt;
use std::time::Duration;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Config, Watermark};
use crate::pipeline::deliver::deliver;
use crate::pipeline::filter::select_new;
use crate::pipeline::paginate::{PaginationSettings, StopReason, fetch_candidates};
use crate::sink::Sink;
use crate::source::FeedSource;
use crate::storage::WatermarkStore;

/// Poll loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Filtering,
    Delivering,
    Sleeping,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "IDLE",
            Self::Fetching => "FETCHING",
            Self::Filtering => "FILTERING",
            Self::Delivering => "DELIVERING",
            Self::Sleeping => "SLEEPING",
        };
        f.write_str(text)
    }
}

/// Settings for the poll loop, derived once from [`Config`].
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Account whose feed is relayed
    pub actor: String,
    pub pagination: PaginationSettings,
    /// Pause between two deliveries
    pub send_delay: Duration,
    /// Sleep between cycles
    pub interval: Duration,
}

impl PollSettings {
    pub fn from_config(config: &Config, actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            pagination: PaginationSettings::from(&config.source),
            send_delay: config.delivery.send_delay(),
            interval: config.poll.interval(),
        }
    }
}

/// Summary of a completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub pages: usize,
    pub fetched: usize,
    pub selected: usize,
    pub delivered: usize,
    pub stop: StopReason,
    pub watermark_before: Watermark,
    pub watermark_after: Watermark,
}

/// Drives synchronization cycles for one account.
///
/// Owns its collaborators; each account needs its own poller and store.
pub struct Poller {
    settings: PollSettings,
    source: Box<dyn FeedSource>,
    sink: Box<dyn Sink>,
    store: Box<dyn WatermarkStore>,
    state: CycleState,
}

impl Poller {
    pub fn new(
        settings: PollSettings,
        source: Box<dyn FeedSource>,
        sink: Box<dyn Sink>,
        store: Box<dyn WatermarkStore>,
    ) -> Self {
        Self {
            settings,
            source,
            sink,
            store,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn store(&self) -> &dyn WatermarkStore {
        self.store.as_ref()
    }

    fn transition(&mut self, next: CycleState) {
        log::debug!("{} -> {}", self.state, next);
        self.state = next;
    }

    /// Run one synchronization cycle.
    ///
    /// Returns an error when fetching fails or delivery stops early; the
    /// watermark then reflects whatever was delivered before the failure.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let result = self.cycle().await;
        self.transition(CycleState::Idle);
        result
    }

    async fn cycle(&mut self) -> Result<CycleReport> {
        self.transition(CycleState::Fetching);
        let before = self.store.load().await?;
        if before.is_epoch() {
            log::warn!(
                "No watermark in {}: every retrievable post counts as new",
                self.store.location()
            );
        }

        let candidates = fetch_candidates(
            self.source.as_ref(),
            &self.settings.actor,
            before,
            &self.settings.pagination,
        )
        .await?;
        log::debug!(
            "Fetched {} candidates over {} pages ({}, {} duplicates)",
            candidates.posts.len(),
            candidates.pages,
            candidates.stop,
            candidates.duplicates
        );

        self.transition(CycleState::Filtering);
        let watermark = self.store.load().await?;
        let selected = select_new(&candidates.posts, watermark);

        self.transition(CycleState::Delivering);
        let delivery = deliver(
            &selected,
            self.sink.as_ref(),
            self.store.as_ref(),
            watermark,
            self.settings.send_delay,
        )
        .await;

        log::info!(
            "Cycle: {} fetched, {} new, {} delivered; watermark {}",
            candidates.posts.len(),
            selected.len(),
            delivery.delivered,
            delivery.watermark
        );

        if let Some(error) = delivery.error {
            return Err(error);
        }

        Ok(CycleReport {
            pages: candidates.pages,
            fetched: candidates.posts.len(),
            selected: selected.len(),
            delivered: delivery.delivered,
            stop: candidates.stop,
            watermark_before: before,
            watermark_after: delivery.watermark,
        })
    }

    /// Poll forever, sleeping the configured interval after every cycle.
    ///
    /// Only process termination ends the loop.
    pub async fn run_forever(&mut self) {
        log::info!(
            "Polling @{} every {:?} via {}",
            self.settings.actor,
            self.settings.interval,
            self.sink.name()
        );
        loop {
            let started = Utc::now();
            match self.run_cycle().await {
                Ok(report) if report.delivered > 0 => {
                    log::info!("Relayed {} new post(s)", report.delivered)
                }
                Ok(_) => log::debug!("Nothing new"),
                Err(e) => log_cycle_failure(&e),
            }
            log::debug!(
                "Cycle took {}ms",
                (Utc::now() - started).num_milliseconds()
            );

            self.transition(CycleState::Sleeping);
            tokio::time::sleep(self.settings.interval).await;
            self.transition(CycleState::Idle);
        }
    }
}

fn log_cycle_failure(error: &AppError) {
    if error.is_transient() {
        log::warn!("Cycle abandoned, retrying next interval: {}", error);
    } else {
        log::error!("Cycle failed: {}", error);
    }
}
