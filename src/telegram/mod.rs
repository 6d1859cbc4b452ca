//! Messaging platform seam.
//!
//! Everything the service needs from the Bot API goes through the
//! [`Messenger`] trait. [`BotApi`] implements it over HTTPS; tests use an
//! in-memory fake.

mod client;
#[cfg(test)]
pub mod fake;

pub use client::BotApi;

use async_trait::async_trait;
use chatlog_proto::{
    ChatMember, File, Message, ParseMode, ResponseError, Update, User, UserProfilePhotos,
};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Bot API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Api(#[from] ResponseError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file {0} has no download path")]
    MissingFilePath(String),
}

impl ApiError {
    /// Whether repeating the request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Api(e) => e.is_rate_limited() || e.code >= 500,
            ApiError::Io(_) => true,
            ApiError::MissingFilePath(_) => false,
        }
    }

    /// Whether the error means the target user is not in the chat.
    pub fn is_not_member(&self) -> bool {
        matches!(self, ApiError::Api(e) if e.is_not_member())
    }
}

/// Operations the service performs against the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// The bot's own account.
    async fn get_me(&self) -> Result<User, ApiError>;

    /// Long-poll for updates with id `>= offset`.
    async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>, ApiError>;

    /// Send a text message, optionally as a reply. Returns the sent message.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        parse_mode: Option<ParseMode>,
    ) -> Result<Message, ApiError>;

    /// Resolve a file id to its size and download path.
    async fn get_file(&self, file_id: &str) -> Result<File, ApiError>;

    /// Download a file by its remote path into `dest`. Returns bytes written.
    async fn download_file(&self, remote_path: &str, dest: &Path) -> Result<u64, ApiError>;

    /// The user's profile photos, most recent first.
    async fn get_user_profile_photos(&self, user_id: i64) -> Result<UserProfilePhotos, ApiError>;

    /// The chat's administrators.
    async fn get_chat_administrators(&self, chat_id: i64) -> Result<Vec<ChatMember>, ApiError>;

    /// Remove a user from the chat. A user who is not a member counts as removed.
    async fn kick_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError>;

    /// Lift a user's ban. A user who is not a member counts as success.
    async fn unban_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError>;

    /// Whether `user_id` administers `chat_id`.
    async fn is_admin(&self, chat_id: i64, user_id: i64) -> Result<bool, ApiError> {
        let admins = self.get_chat_administrators(chat_id).await?;
        Ok(admins.iter().any(|member| member.user.id == user_id))
    }
}
