//! Synchronization pipeline.
//!
//! - `paginate`: Walk the author feed back to the watermark
//! - `filter`: Select the posts not yet delivered
//! - `deliver`: Send them one at a time and advance the watermark
//! - `poll`: Run the three steps on a fixed schedule

pub mod deliver;
pub mod filter;
pub mod paginate;
pub mod poll;

pub use deliver::{DeliveryReport, deliver};
pub use filter::select_new;
pub use paginate::{Candidates, PaginationSettings, StopReason, fetch_candidates};
pub use poll::{CycleReport, CycleState, PollSettings, Poller};

use crate::error::Result;
use crate::models::Config;
use crate::sink;
use crate::source::BlueskyClient;
use crate::storage::FileWatermarkStore;

/// Log in and wire up a poller for the configured account.
///
/// Follows `account.actor` when set, otherwise the logged-in account itself.
pub async fn build_poller(config: &Config, dry_run: bool) -> Result<Poller> {
    let client = BlueskyClient::login(&config.account, &config.source).await?;
    let actor = match config.account.actor.as_deref() {
        Some(actor) if !actor.trim().is_empty() => actor.trim().to_string(),
        _ => client.session_did().await,
    };

    let sink = sink::from_config(&config.delivery, &config.source, dry_run)?;
    let store = FileWatermarkStore::new(&config.storage.state_file);
    log::info!(
        "Relaying @{} via {}, state in {}",
        actor,
        sink.name(),
        config.storage.state_file.display()
    );

    Ok(Poller::new(
        PollSettings::from_config(config, actor),
        Box::new(client),
        sink,
        Box::new(store),
    ))
}
