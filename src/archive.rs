//! The save path for messages, and the outbound [`Courier`].
//!
//! Every message the bot sees, and every message it sends, ends up in the
//! archive: chat and users are upserted first, then the message itself.
//! Attachments and the sender's profile photo are mirrored by background
//! tasks that never hold up the save.

use crate::cache::UserPhotoCache;
use crate::db::{Database, DbError};
use crate::media::MediaPipeline;
use crate::telegram::{ApiError, Messenger};
use chatlog_proto::{Message, ParseMode, User};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct Archive {
    db: Database,
    media: Arc<MediaPipeline>,
    photos: Arc<UserPhotoCache>,
}

impl Archive {
    pub fn new(db: Database, media: Arc<MediaPipeline>, photos: Arc<UserPhotoCache>) -> Self {
        Self { db, media, photos }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    async fn upsert_users(&self, users: &[&User]) -> Result<(), DbError> {
        for user in users {
            self.db.users().upsert(user).await?;
        }
        Ok(())
    }

    /// Write the message and the chat and users it mentions.
    ///
    /// Returns `false` if the message was already archived.
    pub async fn store(&self, msg: &Message) -> Result<bool, DbError> {
        self.db.chats().upsert(&msg.chat).await?;

        // Collected before awaiting so the future stays Send.
        let users: Vec<&User> = msg
            .from
            .iter()
            .chain(msg.forward_from.iter())
            .chain(msg.new_chat_members.iter().flatten())
            .chain(msg.left_chat_member.iter())
            .collect();
        self.upsert_users(&users).await?;

        let inserted = self.db.messages().insert(msg).await?;
        if inserted {
            crate::metrics::record_archived();
        } else {
            debug!(chat_id = msg.chat.id, message_id = msg.message_id, "Message already archived");
        }
        Ok(inserted)
    }

    /// Archive an inbound message, then mirror its media and the sender's photo.
    pub async fn save(&self, msg: &Message) {
        if let Err(e) = self.store(msg).await {
            warn!(chat_id = msg.chat.id, message_id = msg.message_id, error = %e, "Failed to archive message");
        }
    }

    /// Spawn [`save`](Self::save) plus one task per attachment and one for
    /// the sender's profile photo.
    pub fn spawn_save(self: &Arc<Self>, msg: Message) -> Vec<JoinHandle<()>> {
        let mut tasks = self.media.spawn_for_message(&msg);

        if let Some(sender) = msg.from.as_ref().filter(|u| !u.is_bot) {
            let photos = Arc::clone(&self.photos);
            let user_id = sender.id;
            tasks.push(tokio::spawn(async move {
                if let Err(e) = photos.refresh(user_id).await {
                    debug!(user_id, error = %e, "Profile photo refresh failed");
                }
            }));
        }

        let archive = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            archive.save(&msg).await;
        }));
        tasks
    }
}

/// Sends bot messages and archives what was sent.
pub struct Courier {
    messenger: Arc<dyn Messenger>,
    archive: Arc<Archive>,
}

impl Courier {
    pub fn new(messenger: Arc<dyn Messenger>, archive: Arc<Archive>) -> Self {
        Self { messenger, archive }
    }

    pub fn archive(&self) -> &Arc<Archive> {
        &self.archive
    }

    /// Send Markdown text, optionally as a reply, and archive the result.
    ///
    /// Text the platform refuses to parse as Markdown is resent as plain text.
    pub async fn send(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<Message, ApiError> {
        let sent = match self
            .messenger
            .send_message(chat_id, text, reply_to, Some(ParseMode::Markdown))
            .await
        {
            Err(ApiError::Api(e)) if e.is_parse_error() => {
                debug!(chat_id, error = %e, "Markdown rejected, sending as plain text");
                self.messenger
                    .send_message(chat_id, text, reply_to, None)
                    .await?
            }
            other => other?,
        };

        crate::metrics::record_sent();
        if let Err(e) = self.archive.store(&sent).await {
            warn!(chat_id, message_id = sent.message_id, error = %e, "Failed to archive sent message");
        }
        Ok(sent)
    }

    /// Send `text` to every archived chat. Returns how many sends succeeded.
    pub async fn broadcast(&self, text: &str) -> Result<usize, DbError> {
        let chats = self.archive.db().chats().ids().await?;
        let mut delivered = 0;
        for chat_id in chats {
            match self.send(chat_id, text, None).await {
                Ok(_) => delivered += 1,
                Err(e) => warn!(chat_id, error = %e, "Broadcast to chat failed"),
            }
        }
        Ok(delivered)
    }
}
