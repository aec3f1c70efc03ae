// src/lib.rs

//! skyrelay: relays new posts from a Bluesky author timeline to a webhook.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;
