// src/source/bluesky.rs

//! Bluesky (AT Protocol) XRPC client.
//!
//! Establishes an app-password session and reads author feeds through
//! `app.bsky.feed.getAuthorFeed`. Expired access tokens are refreshed once
//! per request.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::{AccountConfig, FeedEntry, FeedPage, SourceConfig};
use crate::source::FeedSource;
use crate::utils::{http, truncate_chars};

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const REFRESH_SESSION: &str = "com.atproto.server.refreshSession";
const GET_AUTHOR_FEED: &str = "app.bsky.feed.getAuthorFeed";

const REASON_REPOST: &str = "app.bsky.feed.defs#reasonRepost";

/// Authenticated session tokens.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    refresh_jwt: String,
    handle: String,
    did: String,
}

/// XRPC error body.
#[derive(Debug, Default, Deserialize)]
struct XrpcError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl XrpcError {
    fn describe(&self, status: StatusCode) -> String {
        match (&self.error, &self.message) {
            (Some(e), Some(m)) => format!("{status} {e}: {m}"),
            (Some(e), None) => format!("{status} {e}"),
            (None, Some(m)) => format!("{status}: {m}"),
            (None, None) => status.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthorFeedResponse {
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    feed: Vec<FeedViewPost>,
}

#[derive(Debug, Deserialize)]
struct FeedViewPost {
    post: PostView,
    #[serde(default)]
    reason: Option<Reason>,
}

#[derive(Debug, Deserialize)]
struct Reason {
    #[serde(rename = "$type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    uri: String,
    author: ProfileView,
    #[serde(default)]
    record: PostRecord,
    #[serde(default)]
    embed: Option<serde_json::Value>,
    indexed_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileView {
    handle: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PostRecord {
    #[serde(default)]
    text: String,
    #[serde(default)]
    embed: Option<serde_json::Value>,
}

impl From<PostView> for FeedEntry {
    fn from(post: PostView) -> Self {
        Self {
            has_embed: post.embed.is_some() || post.record.embed.is_some(),
            uri: post.uri,
            author_handle: post.author.handle,
            author_display_name: post.author.display_name,
            author_avatar: post.author.avatar,
            text: post.record.text,
            indexed_at: post.indexed_at,
        }
    }
}

/// Convert a decoded feed response into a source-neutral page.
///
/// Reposts carry the reposted post's timestamp and would break the
/// newest-first order, so they are dropped unless `include_reposts` is set.
/// Other annotated entries (pins) are always dropped.
fn into_page(response: AuthorFeedResponse, include_reposts: bool) -> FeedPage {
    let entries = response
        .feed
        .into_iter()
        .filter(|item| match &item.reason {
            None => true,
            Some(reason) => include_reposts && reason.kind == REASON_REPOST,
        })
        .map(|item| FeedEntry::from(item.post))
        .collect();

    FeedPage::new(entries, response.cursor.filter(|c| !c.is_empty()))
}

/// Bluesky feed source bound to one session.
pub struct BlueskyClient {
    client: Client,
    service_url: String,
    feed_filter: String,
    include_reposts: bool,
    session: RwLock<Session>,
}

impl BlueskyClient {
    /// Create a session with the account's app password.
    ///
    /// Failure here is fatal for the process.
    pub async fn login(account: &AccountConfig, source: &SourceConfig) -> Result<Self> {
        let client = http::create_async_client(source)?;
        let service_url = source.service_url.trim_end_matches('/').to_string();

        let body = serde_json::json!({
            "identifier": account.identifier,
            "password": account.password,
        });
        let response = client
            .post(xrpc_url(&service_url, CREATE_SESSION))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::auth(format!("createSession request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error: XrpcError = response.json().await.unwrap_or_default();
            return Err(AppError::auth(error.describe(status)));
        }

        let session: Session = response
            .json()
            .await
            .map_err(|e| AppError::auth(format!("invalid session response: {e}")))?;
        log::info!("Logged in as @{} ({})", session.handle, session.did);

        Ok(Self {
            client,
            service_url,
            feed_filter: source.feed_filter.clone(),
            include_reposts: source.include_reposts,
            session: RwLock::new(session),
        })
    }

    /// DID of the logged-in account.
    pub async fn session_did(&self) -> String {
        self.session.read().await.did.clone()
    }

    async fn refresh(&self) -> Result<()> {
        let refresh_jwt = self.session.read().await.refresh_jwt.clone();
        let response = self
            .client
            .post(xrpc_url(&self.service_url, REFRESH_SESSION))
            .bearer_auth(refresh_jwt)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error: XrpcError = response.json().await.unwrap_or_default();
            return Err(AppError::auth(format!(
                "refreshSession: {}",
                error.describe(status)
            )));
        }

        let session: Session = response.json().await?;
        *self.session.write().await = session;
        log::info!("Session refreshed");
        Ok(())
    }

    /// Send an authenticated request, refreshing the session once on `ExpiredToken`.
    async fn send_authed<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.session.read().await.access_jwt.clone();
        let response = build(&self.client).bearer_auth(token).send().await?;

        if response.status() != StatusCode::BAD_REQUEST
            && response.status() != StatusCode::UNAUTHORIZED
        {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let error: XrpcError = serde_json::from_str(&text).unwrap_or_default();
        if error.error.as_deref() != Some("ExpiredToken") {
            return Err(AppError::feed(None, error.describe(status)));
        }

        log::debug!("Access token expired; refreshing session");
        self.refresh().await?;
        let token = self.session.read().await.access_jwt.clone();
        Ok(build(&self.client).bearer_auth(token).send().await?)
    }
}

#[async_trait]
impl FeedSource for BlueskyClient {
    async fn get_author_feed(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<FeedPage> {
        let url = xrpc_url(&self.service_url, GET_AUTHOR_FEED);
        let mut query: Vec<(&str, String)> = vec![
            ("actor", actor.to_string()),
            ("limit", limit.to_string()),
            ("filter", self.feed_filter.clone()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let response = self
            .send_authed(|client| client.get(&url).query(&query))
            .await
            .map_err(|e| match e {
                AppError::Feed { message, .. } => AppError::feed(cursor, message),
                other => AppError::feed(cursor, other),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::feed(cursor, e))?;
        if !status.is_success() {
            let error: XrpcError = serde_json::from_str(&text).unwrap_or_default();
            return Err(AppError::feed(cursor, error.describe(status)));
        }

        let decoded: AuthorFeedResponse = serde_json::from_str(&text).map_err(|e| {
            AppError::feed(
                cursor,
                format!("decoding feed: {e} (body: {})", truncate_chars(&text, 200)),
            )
        })?;
        Ok(into_page(decoded, self.include_reposts))
    }

    fn name(&self) -> &str {
        "bluesky"
    }
}

fn xrpc_url(service_url: &str, nsid: &str) -> String {
    format!("{}/xrpc/{}", service_url.trim_end_matches('/'), nsid)
}
