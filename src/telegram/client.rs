//! Bot API HTTP client.

use super::{ApiError, Messenger};
use async_trait::async_trait;
use chatlog_proto::{
    ApiResponse, ChatMember, File, Message, ParseMode, Update, User, UserProfilePhotos,
};
use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("chatlogd/", env!("CARGO_PKG_VERSION"));

/// Extra time allowed on top of the long-poll timeout before the HTTP
/// request itself is abandoned.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Bot API client.
///
/// Request URLs embed the bot token, so transport errors are stripped of
/// their URL before they leave this module.
pub struct BotApi {
    client: Client,
    base_url: String,
    token: String,
}

impl BotApi {
    /// Creates a client for `base_url` (e.g. `https://api.telegram.org`).
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Http(e.without_url()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, remote_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, remote_path)
    }

    async fn call<P, T>(&self, method: &str, params: &P, timeout: Option<Duration>) -> Result<T, ApiError>
    where
        P: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(self.method_url(method)).json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // Failed calls still carry a JSON envelope, so the status is not checked.
        let response: ApiResponse<T> = request
            .send()
            .await
            .map_err(|e| ApiError::Http(e.without_url()))?
            .json()
            .await
            .map_err(|e| ApiError::Http(e.without_url()))?;

        response.into_result().map_err(|e| {
            debug!(method = method, code = e.code, error = %e.description, "Bot API call failed");
            ApiError::Api(e)
        })
    }
}

#[async_trait]
impl Messenger for BotApi {
    async fn get_me(&self) -> Result<User, ApiError> {
        self.call("getMe", &json!({}), None).await
    }

    async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>, ApiError> {
        let params = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message", "channel_post"],
        });
        self.call("getUpdates", &params, Some(timeout + POLL_GRACE))
            .await
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        parse_mode: Option<ParseMode>,
    ) -> Result<Message, ApiError> {
        let mut params = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(reply_to) = reply_to {
            params["reply_to_message_id"] = json!(reply_to);
            params["allow_sending_without_reply"] = json!(true);
        }
        if let Some(mode) = parse_mode {
            params["parse_mode"] = json!(mode.as_str());
        }
        self.call("sendMessage", &params, None).await
    }

    async fn get_file(&self, file_id: &str) -> Result<File, ApiError> {
        self.call("getFile", &json!({ "file_id": file_id }), None)
            .await
    }

    async fn download_file(&self, remote_path: &str, dest: &Path) -> Result<u64, ApiError> {
        let response = self
            .client
            .get(self.file_url(remote_path))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::Http(e.without_url()))?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ApiError::Http(e.without_url()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn get_user_profile_photos(&self, user_id: i64) -> Result<UserProfilePhotos, ApiError> {
        self.call(
            "getUserProfilePhotos",
            &json!({ "user_id": user_id, "limit": 1 }),
            None,
        )
        .await
    }

    async fn get_chat_administrators(&self, chat_id: i64) -> Result<Vec<ChatMember>, ApiError> {
        self.call("getChatAdministrators", &json!({ "chat_id": chat_id }), None)
            .await
    }

    async fn kick_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError> {
        let result: Result<bool, ApiError> = self
            .call(
                "banChatMember",
                &json!({ "chat_id": chat_id, "user_id": user_id }),
                None,
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_member() => {
                warn!(chat_id, user_id, "Kick target is not a member");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn unban_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError> {
        let result: Result<bool, ApiError> = self
            .call(
                "unbanChatMember",
                &json!({ "chat_id": chat_id, "user_id": user_id, "only_if_banned": true }),
                None,
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_member() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let api = BotApi::new("https://api.example.org/", "1:abc", Duration::from_secs(5)).unwrap();
        assert_eq!(api.method_url("getMe"), "https://api.example.org/bot1:abc/getMe");
        assert_eq!(
            api.file_url("photos/file_1.jpg"),
            "https://api.example.org/file/bot1:abc/photos/file_1.jpg"
        );
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_token() {
        // Nothing listens on port 9 of localhost.
        let api = BotApi::new("http://127.0.0.1:9", "1:secret", Duration::from_secs(2)).unwrap();
        let err = api.get_me().await.unwrap_err();
        assert!(!err.to_string().contains("secret"));
        assert!(err.is_transient());
    }
}
