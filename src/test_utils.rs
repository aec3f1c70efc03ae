//! Shared fakes for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{FeedEntry, FeedPage, Post, Watermark};
use crate::sink::Sink;
use crate::source::FeedSource;
use crate::storage::{MemoryWatermarkStore, WatermarkStore};

pub const VIEWER: &str = "https://bsky.app";

/// Feed entry indexed at `secs` after the epoch, with text `post {secs}`.
pub fn entry(secs: i64) -> FeedEntry {
    let indexed_at = DateTime::from_timestamp(secs, 0)
        .unwrap()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    FeedEntry {
        uri: format!("at://did:plc:test/app.bsky.feed.post/{secs}"),
        author_handle: "alice.test".to_string(),
        author_display_name: Some("Alice".to_string()),
        author_avatar: None,
        text: format!("post {secs}"),
        has_embed: false,
        indexed_at,
    }
}

pub fn post(secs: i64) -> Post {
    Post::from_entry(entry(secs), VIEWER).unwrap()
}

pub fn watermark_at(secs: i64) -> Watermark {
    Watermark::new(DateTime::from_timestamp(secs, 0).unwrap())
}

fn timestamps(posts: &[Post]) -> Vec<i64> {
    posts.iter().map(|p| p.indexed_at.timestamp()).collect()
}

enum Script {
    /// Fixed pages; page `k` is served for cursor `k` (`None` for the first)
    Pages {
        pages: Vec<Vec<FeedEntry>>,
        trailing_cursor: bool,
    },
    /// Never-ending timeline, one entry every ten seconds going back
    Endless { newest: i64, page_len: usize },
}

/// Feed source serving pages from a script.
pub struct ScriptedSource {
    script: Script,
    failures: Vec<usize>,
    cursors: Mutex<Vec<Option<String>>>,
}

impl ScriptedSource {
    pub fn pages(pages: Vec<Vec<FeedEntry>>) -> Self {
        Self::from_script(Script::Pages {
            pages,
            trailing_cursor: false,
        })
    }

    pub fn endless(newest: i64, page_len: usize) -> Self {
        Self::from_script(Script::Endless { newest, page_len })
    }

    fn from_script(script: Script) -> Self {
        Self {
            script,
            failures: Vec::new(),
            cursors: Mutex::new(Vec::new()),
        }
    }

    /// Hand back a cursor on the last page too.
    pub fn with_trailing_cursor(mut self) -> Self {
        if let Script::Pages {
            trailing_cursor, ..
        } = &mut self.script
        {
            *trailing_cursor = true;
        }
        self
    }

    /// Fail `times` consecutive calls starting at the 0-based call `first`.
    pub fn failing_on(mut self, first: usize, times: usize) -> Self {
        self.failures.extend(first..first + times);
        self
    }

    pub fn requested_cursors(&self) -> Vec<Option<String>> {
        self.cursors.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.cursors.lock().unwrap().len()
    }

    fn page(&self, index: usize) -> FeedPage {
        match &self.script {
            Script::Pages {
                pages,
                trailing_cursor,
            } => match pages.get(index) {
                Some(entries) => {
                    let more = index + 1 < pages.len() || *trailing_cursor;
                    FeedPage::new(entries.clone(), more.then(|| (index + 1).to_string()))
                }
                None => FeedPage::default(),
            },
            Script::Endless { newest, page_len } => {
                let first = index * page_len;
                let entries = (first..first + page_len)
                    .map(|i| entry(newest - 10 * i as i64))
                    .collect();
                FeedPage::new(entries, Some((index + 1).to_string()))
            }
        }
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn get_author_feed(
        &self,
        _actor: &str,
        cursor: Option<&str>,
        _limit: u32,
    ) -> Result<FeedPage> {
        let call = {
            let mut cursors = self.cursors.lock().unwrap();
            cursors.push(cursor.map(str::to_string));
            cursors.len() - 1
        };
        if self.failures.contains(&call) {
            return Err(AppError::feed(cursor, "scripted failure"));
        }

        let index = match cursor {
            None => 0,
            Some(c) => c
                .parse()
                .map_err(|_| AppError::feed(cursor, "unknown cursor"))?,
        };
        Ok(self.page(index))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct Recording {
    attempted: Vec<Post>,
    attempted_at: Vec<Instant>,
    delivered: Vec<Post>,
}

/// Sink that records what it was handed. Clones share one recording.
#[derive(Clone, Default)]
pub struct RecordingSink {
    fail_on: Option<usize>,
    recording: Arc<Mutex<Recording>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the 0-based attempt `attempt`; every other attempt succeeds.
    pub fn failing_on(mut self, attempt: usize) -> Self {
        self.fail_on = Some(attempt);
        self
    }

    pub fn attempted_times(&self) -> Vec<i64> {
        timestamps(&self.recording.lock().unwrap().attempted)
    }

    /// Runtime clock reading at each attempt.
    pub fn attempt_instants(&self) -> Vec<Instant> {
        self.recording.lock().unwrap().attempted_at.clone()
    }

    pub fn delivered_times(&self) -> Vec<i64> {
        timestamps(&self.recording.lock().unwrap().delivered)
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn deliver(&self, post: &Post) -> Result<()> {
        let mut recording = self.recording.lock().unwrap();
        let attempt = recording.attempted.len();
        recording.attempted.push(post.clone());
        recording.attempted_at.push(Instant::now());
        if self.fail_on == Some(attempt) {
            return Err(AppError::delivery(&post.uri, "rejected by test sink"));
        }
        recording.delivered.push(post.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Store that reads as the epoch and refuses every save.
pub struct FailingStore;

#[async_trait]
impl WatermarkStore for FailingStore {
    async fn load(&self) -> Result<Watermark> {
        Ok(Watermark::epoch())
    }

    async fn save(&self, _watermark: Watermark) -> Result<()> {
        Err(AppError::watermark("disk full"))
    }

    fn location(&self) -> String {
        "nowhere".to_string()
    }
}

/// Memory store handle that stays inspectable after being boxed.
#[derive(Clone)]
pub struct SharedStore(Arc<MemoryWatermarkStore>);

impl SharedStore {
    pub fn new(store: MemoryWatermarkStore) -> Self {
        Self(Arc::new(store))
    }

    pub fn current(&self) -> Watermark {
        self.0.current()
    }

    pub fn history(&self) -> Vec<Watermark> {
        self.0.history()
    }
}

#[async_trait]
impl WatermarkStore for SharedStore {
    async fn load(&self) -> Result<Watermark> {
        self.0.load().await
    }

    async fn save(&self, watermark: Watermark) -> Result<()> {
        self.0.save(watermark).await
    }

    fn location(&self) -> String {
        self.0.location()
    }
}
