//! # chatlog-proto
//!
//! Wire types for the Telegram Bot API subset used by `chatlogd`, together
//! with bot command parsing and Markdown helpers.
//!
//! ## Features
//!
//! - Serde models for updates, messages, chats, users and files
//! - Enumeration of every downloadable media reference in a message
//! - `/command@bot arguments` parsing
//! - The `{ ok, result, description }` response envelope
//!
//! ## Quick Start
//!
//! ```rust
//! use chatlog_proto::{BotCommand, Message};
//!
//! let raw = r#"{"message_id":7,"date":1700000000,
//!     "chat":{"id":-100,"type":"supergroup","title":"Rustaceans"},
//!     "from":{"id":42,"is_bot":false,"first_name":"Ferris"},
//!     "text":"/flood@archive_bot"}"#;
//! let message: Message = serde_json::from_str(raw).unwrap();
//!
//! let cmd = BotCommand::parse(message.text.as_deref().unwrap()).unwrap();
//! assert_eq!(cmd.name, "flood");
//! assert_eq!(cmd.mention, Some("archive_bot"));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod format;
pub mod response;
pub mod types;

pub use command::BotCommand;
pub use error::ResponseError;
pub use response::{ApiResponse, ResponseParameters};
pub use types::{
    Audio, Chat, ChatKind, ChatMember, Document, File, MediaKind, MediaRef, Message,
    MessageEntity, ParseMode, PhotoSize, Sticker, Update, User, UserProfilePhotos, Video, Voice,
};
