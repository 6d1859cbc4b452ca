//! Unified error handling for chatlogd.
//!
//! Each layer has its own `thiserror` enum (`DbError`, `ApiError`,
//! `FeedError`, `MediaError`, ...). Handlers and pipelines funnel them into
//! [`BotError`], whose four kinds decide what happens next: retry later,
//! tell the user, or give up.

use crate::db::DbError;
use crate::feeds::FeedError;
use crate::media::MediaError;
use crate::telegram::ApiError;
use thiserror::Error;

/// Errors surfaced by command handlers and background pipelines.
#[derive(Debug, Error)]
pub enum BotError {
    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Temporary failure (store, network); the operation may be retried.
    #[error("temporary failure: {0}")]
    Transient(String),

    /// The request itself is wrong; retrying will not help.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unrecoverable failure.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl BotError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Transient(_) => "transient",
            Self::InvalidInput(_) => "invalid_input",
            Self::Fatal(_) => "fatal",
        }
    }

    /// Whether the operation may succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), BotError>;

impl From<DbError> for BotError {
    fn from(err: DbError) -> Self {
        match err {
            e if e.is_not_found() => BotError::NotFound(e.to_string()),
            e @ DbError::AlreadyExists(_) => BotError::InvalidInput(e.to_string()),
            e @ DbError::Migration(_) => BotError::Fatal(e.to_string()),
            e @ DbError::Json(_) => BotError::Fatal(e.to_string()),
            e => BotError::Transient(e.to_string()),
        }
    }
}

impl From<ApiError> for BotError {
    fn from(err: ApiError) -> Self {
        match &err {
            _ if err.is_transient() => BotError::Transient(err.to_string()),
            ApiError::Api(e) if e.code == 401 => BotError::Fatal(err.to_string()),
            ApiError::Api(e) if e.code == 404 => BotError::NotFound(err.to_string()),
            ApiError::Api(_) | ApiError::MissingFilePath(_) => {
                BotError::InvalidInput(err.to_string())
            }
            ApiError::Http(_) | ApiError::Io(_) => BotError::Transient(err.to_string()),
        }
    }
}

impl From<FeedError> for BotError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Db(e) => e.into(),
            e @ FeedError::Fetch(_) => BotError::Transient(e.to_string()),
            e @ FeedError::Status(_) => BotError::InvalidInput(e.to_string()),
            e @ FeedError::Parse(_) => BotError::InvalidInput(e.to_string()),
        }
    }
}

impl From<MediaError> for BotError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Api(e) => e.into(),
            MediaError::Db(e) => e.into(),
            e @ MediaError::Io(_) => BotError::Transient(e.to_string()),
            e @ MediaError::Unresolved(_) => BotError::NotFound(e.to_string()),
        }
    }
}
