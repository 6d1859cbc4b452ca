//! In-memory [`Messenger`] used by unit tests.

use super::{ApiError, Messenger};
use async_trait::async_trait;
use chatlog_proto::{
    Chat, ChatKind, ChatMember, File, Message, ParseMode, PhotoSize, ResponseError, Update, User,
    UserProfilePhotos,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

/// A message the fake was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub chat_id: i64,
    pub text: String,
    pub reply_to: Option<i64>,
}

pub struct FakeMessenger {
    me: User,
    admins: Mutex<HashMap<i64, Vec<i64>>>,
    files: Mutex<HashMap<String, File>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    photos: Mutex<HashMap<i64, UserProfilePhotos>>,
    updates: Mutex<Vec<Update>>,
    sent: Mutex<Vec<Sent>>,
    kicks: Mutex<Vec<(i64, i64)>>,
    unbans: Mutex<Vec<(i64, i64)>>,
    downloads: AtomicUsize,
    fail_kicks: AtomicBool,
    next_message_id: AtomicI64,
}

pub const BOT_ID: i64 = 1000;

pub fn user(id: i64, first_name: &str) -> User {
    User {
        id,
        is_bot: false,
        first_name: first_name.to_string(),
        last_name: None,
        username: None,
        language_code: None,
    }
}

fn bad_request(description: &str) -> ApiError {
    ApiError::Api(ResponseError {
        code: 400,
        description: format!("Bad Request: {description}"),
        retry_after: None,
    })
}

impl FakeMessenger {
    pub fn new() -> Self {
        let mut me = user(BOT_ID, "Archive");
        me.is_bot = true;
        me.username = Some("archive_bot".to_string());
        Self {
            me,
            admins: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
            contents: Mutex::new(HashMap::new()),
            photos: Mutex::new(HashMap::new()),
            updates: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            kicks: Mutex::new(Vec::new()),
            unbans: Mutex::new(Vec::new()),
            downloads: AtomicUsize::new(0),
            fail_kicks: AtomicBool::new(false),
            next_message_id: AtomicI64::new(10_000),
        }
    }

    pub fn me(&self) -> &User {
        &self.me
    }

    pub fn set_admins(&self, chat_id: i64, user_ids: &[i64]) {
        self.admins.lock().insert(chat_id, user_ids.to_vec());
    }

    /// Register a downloadable file.
    pub fn add_file(&self, file_id: &str, remote_path: &str, content: &[u8]) {
        self.files.lock().insert(
            file_id.to_string(),
            File {
                file_id: file_id.to_string(),
                file_size: Some(content.len() as u64),
                file_path: Some(remote_path.to_string()),
            },
        );
        self.contents
            .lock()
            .insert(remote_path.to_string(), content.to_vec());
    }

    /// Give a user a profile photo backed by a downloadable file.
    pub fn add_profile_photo(&self, user_id: i64, file_id: &str, content: &[u8]) {
        self.add_file(file_id, &format!("profile_photos/{file_id}.jpg"), content);
        self.photos.lock().insert(
            user_id,
            UserProfilePhotos {
                total_count: 1,
                photos: vec![vec![PhotoSize {
                    file_id: file_id.to_string(),
                    file_unique_id: None,
                    width: 160,
                    height: 160,
                    file_size: Some(content.len() as u64),
                }]],
            },
        );
    }

    pub fn push_update(&self, update: Update) {
        self.updates.lock().push(update);
    }

    pub fn fail_kicks(&self, fail: bool) {
        self.fail_kicks.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn last_sent(&self) -> Option<Sent> {
        self.sent.lock().last().cloned()
    }

    pub fn kicks(&self) -> Vec<(i64, i64)> {
        self.kicks.lock().clone()
    }

    pub fn unbans(&self) -> Vec<(i64, i64)> {
        self.unbans.lock().clone()
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn get_me(&self) -> Result<User, ApiError> {
        Ok(self.me.clone())
    }

    async fn get_updates(&self, offset: i64, _timeout: Duration) -> Result<Vec<Update>, ApiError> {
        let mut updates = self.updates.lock();
        updates.retain(|u| u.update_id >= offset);
        Ok(updates.clone())
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        _parse_mode: Option<ParseMode>,
    ) -> Result<Message, ApiError> {
        self.sent.lock().push(Sent {
            chat_id,
            text: text.to_string(),
            reply_to,
        });
        Ok(Message {
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            from: Some(self.me.clone()),
            date: chrono::Utc::now().timestamp(),
            chat: Chat {
                id: chat_id,
                kind: ChatKind::Supergroup,
                title: Some("Test".to_string()),
                username: None,
                first_name: None,
                last_name: None,
            },
            forward_from: None,
            reply_to_message: None,
            edit_date: None,
            text: Some(text.to_string()),
            entities: None,
            caption: None,
            audio: None,
            document: None,
            photo: None,
            sticker: None,
            video: None,
            voice: None,
            new_chat_members: None,
            left_chat_member: None,
            new_chat_title: None,
            new_chat_photo: None,
        })
    }

    async fn get_file(&self, file_id: &str) -> Result<File, ApiError> {
        self.files
            .lock()
            .get(file_id)
            .cloned()
            .ok_or_else(|| bad_request("invalid file_id"))
    }

    async fn download_file(&self, remote_path: &str, dest: &Path) -> Result<u64, ApiError> {
        let content = self
            .contents
            .lock()
            .get(remote_path)
            .cloned()
            .ok_or_else(|| bad_request("file not found"))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dest, &content).await?;
        Ok(content.len() as u64)
    }

    async fn get_user_profile_photos(&self, user_id: i64) -> Result<UserProfilePhotos, ApiError> {
        Ok(self
            .photos
            .lock()
            .get(&user_id)
            .cloned()
            .unwrap_or(UserProfilePhotos {
                total_count: 0,
                photos: Vec::new(),
            }))
    }

    async fn get_chat_administrators(&self, chat_id: i64) -> Result<Vec<ChatMember>, ApiError> {
        let ids = self.admins.lock().get(&chat_id).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .map(|id| ChatMember {
                status: "administrator".to_string(),
                user: if id == self.me.id {
                    self.me.clone()
                } else {
                    user(id, "Admin")
                },
            })
            .collect())
    }

    async fn kick_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError> {
        if self.fail_kicks.load(Ordering::SeqCst) {
            return Err(bad_request("not enough rights to restrict/unrestrict chat member"));
        }
        self.kicks.lock().push((chat_id, user_id));
        Ok(())
    }

    async fn unban_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError> {
        self.unbans.lock().push((chat_id, user_id));
        Ok(())
    }
}
