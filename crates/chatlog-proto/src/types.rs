//! Serde models for the Bot API objects the archive stores and inspects.
//!
//! Only the fields `chatlogd` reads are modelled; unknown fields are ignored
//! on input. Optional fields are skipped on output so that the stored JSON
//! stays compact.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry returned by `getUpdates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Monotonic update identifier, used as the polling offset.
    pub update_id: i64,
    /// New incoming message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// New version of a message that was edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Message>,
    /// New incoming channel post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_post: Option<Message>,
}

impl Update {
    /// The message carried by this update, if it carries a new one.
    ///
    /// Edits are ignored: the archive keeps the first version it saw.
    pub fn into_message(self) -> Option<Message> {
        self.message.or(self.channel_post)
    }
}

/// A platform user or bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: i64,
    /// `true` for bots.
    #[serde(default)]
    pub is_bot: bool,
    /// First name.
    pub first_name: String,
    /// Last name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Username without the leading `@`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// IETF language tag of the user's client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

impl User {
    /// Full name, `first last` or just `first`.
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

impl fmt::Display for User {
    /// Username when set, otherwise the full name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.username.as_deref() {
            Some(username) if !username.is_empty() => f.write_str(username),
            _ => f.write_str(&self.full_name()),
        }
    }
}

/// Kind of chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// One-to-one chat with the bot.
    Private,
    /// Basic group.
    Group,
    /// Supergroup.
    Supergroup,
    /// Broadcast channel.
    Channel,
    /// Anything this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl ChatKind {
    /// Stable lowercase name, as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Private => "private",
            ChatKind::Group => "group",
            ChatKind::Supergroup => "supergroup",
            ChatKind::Channel => "channel",
            ChatKind::Unknown => "unknown",
        }
    }

    /// Parse the wire name; unknown names map to [`ChatKind::Unknown`].
    pub fn parse(s: &str) -> Self {
        match s {
            "private" => ChatKind::Private,
            "group" => ChatKind::Group,
            "supergroup" => ChatKind::Supergroup,
            "channel" => ChatKind::Channel,
            _ => ChatKind::Unknown,
        }
    }

    /// Groups and supergroups.
    pub fn is_group(&self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

/// A chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Unique identifier (negative for groups and channels).
    pub id: i64,
    /// Kind of chat.
    #[serde(rename = "type")]
    pub kind: ChatKind,
    /// Title, for groups and channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Public username, for public chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Other party's first name, for private chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Other party's last name, for private chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl Chat {
    /// Public username if the chat has one.
    pub fn public_username(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty())
    }
}

/// Formatting mode for outgoing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Legacy Markdown.
    Markdown,
    /// MarkdownV2.
    MarkdownV2,
    /// HTML subset.
    Html,
}

impl ParseMode {
    /// Wire value of the `parse_mode` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Markdown => "Markdown",
            ParseMode::MarkdownV2 => "MarkdownV2",
            ParseMode::Html => "HTML",
        }
    }
}

/// A formatting entity inside message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    /// Entity type (`bot_command`, `url`, `mention`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Offset in UTF-16 code units.
    pub offset: i64,
    /// Length in UTF-16 code units.
    pub length: i64,
}

/// One size of a photo or thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    /// Identifier used to download the file.
    pub file_id: String,
    /// Identifier stable across bots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_unique_id: Option<String>,
    /// Width in pixels.
    #[serde(default)]
    pub width: i64,
    /// Height in pixels.
    #[serde(default)]
    pub height: i64,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// Audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audio {
    /// Identifier used to download the file.
    pub file_id: String,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: i64,
    /// Performer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performer: Option<String>,
    /// Title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// General file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier used to download the file.
    pub file_id: String,
    /// Original file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// Sticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sticker {
    /// Identifier used to download the file.
    pub file_id: String,
    /// Emoji associated with the sticker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// Video file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    /// Identifier used to download the file.
    pub file_id: String,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: i64,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// Voice note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Identifier used to download the file.
    pub file_id: String,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: i64,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// A file ready to be downloaded, as returned by `getFile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Identifier used to download the file.
    pub file_id: String,
    /// Size in bytes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Relative path on the file server, e.g. `photos/file_3.jpg`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Result of `getUserProfilePhotos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfilePhotos {
    /// Total number of photos the user has.
    pub total_count: i64,
    /// Requested photos, each in up to four sizes.
    pub photos: Vec<Vec<PhotoSize>>,
}

impl UserProfilePhotos {
    /// File id of the smallest size of the most recent photo.
    pub fn current_photo_id(&self) -> Option<&str> {
        self.photos
            .first()
            .and_then(|sizes| sizes.first())
            .map(|size| size.file_id.as_str())
    }
}

/// Membership record returned by `getChatAdministrators`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMember {
    /// Member status (`creator`, `administrator`, `member`, ...).
    pub status: String,
    /// The member.
    pub user: User,
}

/// Kind of downloadable media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Audio file.
    Audio,
    /// General file.
    Document,
    /// One size of a photo.
    Photo,
    /// Sticker.
    Sticker,
    /// Video.
    Video,
    /// Voice note.
    Voice,
    /// New chat photo service message.
    ChatPhoto,
}

impl MediaKind {
    /// Lowercase label, used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Photo => "photo",
            MediaKind::Sticker => "sticker",
            MediaKind::Video => "video",
            MediaKind::Voice => "voice",
            MediaKind::ChatPhoto => "chat_photo",
        }
    }
}

/// A reference to one downloadable file in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// What the file is.
    pub kind: MediaKind,
    /// Identifier used to download it.
    pub file_id: String,
}

/// A message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier, unique inside the chat.
    pub message_id: i64,
    /// Sender; absent for channel posts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    /// Unix time the message was sent.
    pub date: i64,
    /// Chat the message belongs to.
    pub chat: Chat,
    /// Original sender of a forwarded message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_from: Option<User>,
    /// Message this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,
    /// Unix time of the last edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_date: Option<i64>,
    /// Text, for text messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Entities in `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<MessageEntity>>,
    /// Caption for media messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Attached audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    /// Attached document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    /// Attached photo, all available sizes, smallest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Vec<PhotoSize>>,
    /// Attached sticker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<Sticker>,
    /// Attached video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    /// Attached voice note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<Voice>,
    /// Members who joined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_chat_members: Option<Vec<User>>,
    /// Member who left.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_chat_member: Option<User>,
    /// New chat title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_chat_title: Option<String>,
    /// New chat photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_chat_photo: Option<Vec<PhotoSize>>,
}

impl Message {
    /// Text or caption, whichever is present.
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    /// The largest size of the attached photo.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo.as_ref().and_then(|sizes| sizes.last())
    }

    /// Every downloadable file attached to this message.
    ///
    /// Photos contribute one reference per size.
    pub fn media_refs(&self) -> Vec<MediaRef> {
        let mut refs = Vec::new();
        let mut push = |kind, file_id: &str| {
            refs.push(MediaRef {
                kind,
                file_id: file_id.to_string(),
            })
        };

        if let Some(audio) = &self.audio {
            push(MediaKind::Audio, &audio.file_id);
        }
        if let Some(document) = &self.document {
            push(MediaKind::Document, &document.file_id);
        }
        for size in self.photo.iter().flatten() {
            push(MediaKind::Photo, &size.file_id);
        }
        if let Some(sticker) = &self.sticker {
            push(MediaKind::Sticker, &sticker.file_id);
        }
        if let Some(video) = &self.video {
            push(MediaKind::Video, &video.file_id);
        }
        if let Some(voice) = &self.voice {
            push(MediaKind::Voice, &voice.file_id);
        }
        for size in self.new_chat_photo.iter().flatten() {
            push(MediaKind::ChatPhoto, &size.file_id);
        }

        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>, last: Option<&str>) -> User {
        User {
            id: 1,
            is_bot: false,
            first_name: "Ada".to_string(),
            last_name: last.map(String::from),
            username: username.map(String::from),
            language_code: None,
        }
    }

    #[test]
    fn user_display_prefers_username() {
        assert_eq!(user(Some("ada"), Some("Lovelace")).to_string(), "ada");
        assert_eq!(user(None, Some("Lovelace")).to_string(), "Ada Lovelace");
        assert_eq!(user(Some(""), None).to_string(), "Ada");
    }

    #[test]
    fn unknown_chat_kind_is_tolerated() {
        let chat: Chat =
            serde_json::from_str(r#"{"id":5,"type":"forum_topic_of_the_future"}"#).unwrap();
        assert_eq!(chat.kind, ChatKind::Unknown);
        assert_eq!(ChatKind::parse("supergroup"), ChatKind::Supergroup);
        assert!(ChatKind::Supergroup.is_group());
        assert!(!ChatKind::Private.is_group());
    }

    #[test]
    fn media_refs_cover_every_attachment() {
        let raw = r#"{
            "message_id": 10, "date": 1,
            "chat": {"id": 1, "type": "private"},
            "photo": [
                {"file_id": "small", "width": 90, "height": 90},
                {"file_id": "big", "width": 800, "height": 800, "file_size": 1024}
            ],
            "voice": {"file_id": "v1", "duration": 3},
            "document": {"file_id": "d1", "file_name": "a.pdf"}
        }"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let refs = msg.media_refs();
        let ids: Vec<_> = refs.iter().map(|r| r.file_id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "small", "big", "v1"]);
        assert_eq!(msg.largest_photo().unwrap().file_id, "big");
    }

    #[test]
    fn stored_json_skips_absent_fields() {
        let raw = r#"{"message_id":1,"date":2,"chat":{"id":3,"type":"group","title":"t"},"text":"hi"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let encoded = serde_json::to_string(&msg).unwrap();
        assert!(!encoded.contains("audio"));
        assert!(encoded.contains("\"type\":\"group\""));
    }

    #[test]
    fn current_profile_photo() {
        let photos = UserProfilePhotos {
            total_count: 2,
            photos: vec![vec![PhotoSize {
                file_id: "p0".to_string(),
                file_unique_id: None,
                width: 160,
                height: 160,
                file_size: None,
            }]],
        };
        assert_eq!(photos.current_photo_id(), Some("p0"));

        let empty = UserProfilePhotos {
            total_count: 0,
            photos: vec![],
        };
        assert_eq!(empty.current_photo_id(), None);
    }
}
