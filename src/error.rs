// src/error.rs

//! Unified error handling for the relay.

use std::fmt;

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Session could not be established with the feed source
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A feed page could not be fetched
    #[error("Feed error at cursor {cursor}: {message}")]
    Feed { cursor: String, message: String },

    /// A feed entry carried data the relay cannot order
    #[error("Malformed post {uri}: {message}")]
    MalformedPost { uri: String, message: String },

    /// A sink rejected a post
    #[error("Delivery failed for {post}: {message}")]
    Delivery { post: String, message: String },

    /// The watermark could not be persisted
    #[error("Watermark error: {0}")]
    Watermark(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an authentication error.
    pub fn auth(message: impl fmt::Display) -> Self {
        Self::Auth(message.to_string())
    }

    /// Create a feed error for the page requested with `cursor`.
    pub fn feed(cursor: Option<&str>, message: impl fmt::Display) -> Self {
        Self::Feed {
            cursor: cursor.unwrap_or("<first page>").to_string(),
            message: message.to_string(),
        }
    }

    /// Create a malformed post error.
    pub fn malformed_post(uri: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedPost {
            uri: uri.into(),
            message: message.to_string(),
        }
    }

    /// Create a delivery error.
    pub fn delivery(post: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Delivery {
            post: post.into(),
            message: message.to_string(),
        }
    }

    /// Create a watermark persistence error.
    pub fn watermark(message: impl fmt::Display) -> Self {
        Self::Watermark(message.to_string())
    }

    /// Whether the error only abandons the current cycle.
    ///
    /// Configuration and authentication failures are fatal at startup;
    /// everything else is retried on the next scheduled cycle.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::Validation(_) | Self::Auth(_) | Self::Toml(_)
        )
    }
}
