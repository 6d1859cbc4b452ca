//! Archive repositories: chats, users and messages.
//!
//! Chats and users are upserted from every message that mentions them.
//! Messages keep a few indexed columns for the web view plus the full JSON
//! as received, so nothing the platform sent is lost.

use super::DbError;
use chatlog_proto::{Chat, ChatKind, Message, User};
use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;
use std::fmt;

/// A stored chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRecord {
    pub id: i64,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ChatRecord {
    /// Human readable name: the title for groups and channels, the other
    /// party's name for private chats.
    pub fn display_name(&self) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let full = full.trim();
        match self.username.as_deref().filter(|u| !u.is_empty()) {
            Some(username) if full.is_empty() => username.to_string(),
            Some(username) => format!("{username} ({full})"),
            None if full.is_empty() => self.id.to_string(),
            None => full.to_string(),
        }
    }
}

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{} ({} {})",
            self.username.as_deref().unwrap_or(""),
            self.first_name,
            self.last_name.as_deref().unwrap_or("")
        )
    }
}

/// A stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub chat_id: i64,
    pub message_id: i64,
    pub from_id: Option<i64>,
    pub date: i64,
    pub text: Option<String>,
    pub raw_json: String,
}

impl MessageRecord {
    /// Decode the full message as it was received.
    pub fn message(&self) -> Result<Message, DbError> {
        Ok(serde_json::from_str(&self.raw_json)?)
    }
}

type ChatRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn chat_from_row(row: ChatRow) -> ChatRecord {
    let (id, kind, title, username, first_name, last_name) = row;
    ChatRecord {
        id,
        kind: ChatKind::parse(&kind),
        title,
        username,
        first_name,
        last_name,
    }
}

type UserRow = (i64, bool, String, Option<String>, Option<String>);

fn user_from_row(row: UserRow) -> UserRecord {
    let (id, is_bot, first_name, last_name, username) = row;
    UserRecord {
        id,
        is_bot,
        first_name,
        last_name,
        username,
    }
}

/// Repository for chat operations.
pub struct ChatRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ChatRepository<'a> {
    /// Create a new chat repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a chat, or refresh its names if it is already stored.
    pub async fn upsert(&self, chat: &Chat) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO chats (id, kind, title, username, first_name, last_name)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                title = excluded.title,
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name
            "#,
        )
        .bind(chat.id)
        .bind(chat.kind.as_str())
        .bind(&chat.title)
        .bind(&chat.username)
        .bind(&chat.first_name)
        .bind(&chat.last_name)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Find a chat by id.
    pub async fn get(&self, id: i64) -> Result<Option<ChatRecord>, DbError> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, kind, title, username, first_name, last_name FROM chats WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(chat_from_row))
    }

    /// Every stored chat, ordered by id.
    pub async fn list(&self) -> Result<Vec<ChatRecord>, DbError> {
        let rows = sqlx::query_as::<_, ChatRow>(
            "SELECT id, kind, title, username, first_name, last_name FROM chats ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(chat_from_row).collect())
    }

    /// Ids of every stored chat.
    pub async fn ids(&self) -> Result<Vec<i64>, DbError> {
        let ids = sqlx::query_scalar("SELECT id FROM chats ORDER BY id")
            .fetch_all(self.pool)
            .await?;

        Ok(ids)
    }
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user, or refresh their names if already stored.
    pub async fn upsert(&self, user: &User) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, is_bot, first_name, last_name, username, language_code)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                is_bot = excluded.is_bot,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                username = excluded.username,
                language_code = excluded.language_code
            "#,
        )
        .bind(user.id)
        .bind(user.is_bot)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.language_code)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Find a user by id.
    pub async fn get(&self, id: i64) -> Result<Option<UserRecord>, DbError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, is_bot, first_name, last_name, username FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }

    /// Every stored user.
    pub async fn list(&self) -> Result<Vec<UserRecord>, DbError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, is_bot, first_name, last_name, username FROM users ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(user_from_row).collect())
    }

    /// Find users matching a name typed by a person.
    ///
    /// - `@name` or `name`: matches the username, first name or last name.
    /// - `first last`: matches the full name in either order.
    pub async fn search(&self, query: &str) -> Result<Vec<UserRecord>, DbError> {
        let query = query.trim();
        let query = query.strip_prefix('@').unwrap_or(query);

        let mut words = query.split_whitespace();
        let rows = match (words.next(), words.next()) {
            (None, _) => Vec::new(),
            (Some(first), Some(last)) => {
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT id, is_bot, first_name, last_name, username FROM users
                    WHERE (first_name = ? AND last_name = ?)
                       OR (first_name = ? AND last_name = ?)
                    ORDER BY id
                    "#,
                )
                .bind(first)
                .bind(last)
                .bind(last)
                .bind(first)
                .fetch_all(self.pool)
                .await?
            }
            (Some(name), None) => {
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT id, is_bot, first_name, last_name, username FROM users
                    WHERE first_name = ? OR last_name = ? OR username = ? COLLATE NOCASE
                    ORDER BY id
                    "#,
                )
                .bind(name)
                .bind(name)
                .bind(name)
                .fetch_all(self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(user_from_row).collect())
    }
}

/// Repository for message operations.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

/// Unix seconds of midnight UTC at the start of `date`.
fn midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::default()).and_utc().timestamp()
}

impl<'a> MessageRepository<'a> {
    /// Create a new message repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a message. Returns `false` if it was already archived.
    pub async fn insert(&self, message: &Message) -> Result<bool, DbError> {
        let raw_json = serde_json::to_string(message)?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO messages (chat_id, message_id, from_id, date, text, raw_json)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.chat.id)
        .bind(message.message_id)
        .bind(message.from.as_ref().map(|u| u.id))
        .bind(message.date)
        .bind(message.body())
        .bind(raw_json)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Find a single message.
    pub async fn get(&self, chat_id: i64, message_id: i64) -> Result<Option<MessageRecord>, DbError> {
        let row = sqlx::query_as::<_, (i64, i64, Option<i64>, i64, Option<String>, String)>(
            r#"
            SELECT chat_id, message_id, from_id, date, text, raw_json
            FROM messages WHERE chat_id = ? AND message_id = ?
            "#,
        )
        .bind(chat_id)
        .bind(message_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(
            |(chat_id, message_id, from_id, date, text, raw_json)| MessageRecord {
                chat_id,
                message_id,
                from_id,
                date,
                text,
                raw_json,
            },
        ))
    }

    /// Distinct UTC `strftime` components of message dates in `[start, end)`.
    async fn distinct_parts(
        &self,
        chat_id: i64,
        format: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<u32>, DbError> {
        let parts = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT CAST(strftime(?, date, 'unixepoch') AS INTEGER) AS part
            FROM messages
            WHERE chat_id = ? AND date >= ? AND date < ?
            ORDER BY part
            "#,
        )
        .bind(format)
        .bind(chat_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;

        Ok(parts.into_iter().map(|p| p as u32).collect())
    }

    /// Years with at least one message in the chat.
    pub async fn years(&self, chat_id: i64) -> Result<Vec<i32>, DbError> {
        let years = self
            .distinct_parts(chat_id, "%Y", i64::MIN, i64::MAX)
            .await?;
        Ok(years.into_iter().map(|y| y as i32).collect())
    }

    /// Months (1-12) of `year` with at least one message.
    pub async fn months(&self, chat_id: i64, year: i32) -> Result<Vec<u32>, DbError> {
        let (Some(start), Some(end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year + 1, 1, 1),
        ) else {
            return Ok(Vec::new());
        };
        self.distinct_parts(chat_id, "%m", midnight(start), midnight(end))
            .await
    }

    /// Days of the month with at least one message.
    pub async fn days(&self, chat_id: i64, year: i32, month: u32) -> Result<Vec<u32>, DbError> {
        let Some(start) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return Ok(Vec::new());
        };
        let Some(end) = start.checked_add_months(chrono::Months::new(1)) else {
            return Ok(Vec::new());
        };
        self.distinct_parts(chat_id, "%d", midnight(start), midnight(end))
            .await
    }

    /// Messages sent on one UTC day, oldest first.
    pub async fn for_day(
        &self,
        chat_id: i64,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<Vec<MessageRecord>, DbError> {
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            return Ok(Vec::new());
        };
        let start = midnight(date);
        let end = start + 86_400;

        let rows = sqlx::query_as::<_, (i64, i64, Option<i64>, i64, Option<String>, String)>(
            r#"
            SELECT chat_id, message_id, from_id, date, text, raw_json
            FROM messages
            WHERE chat_id = ? AND date >= ? AND date < ?
            ORDER BY date, message_id
            "#,
        )
        .bind(chat_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(chat_id, message_id, from_id, date, text, raw_json)| MessageRecord {
                    chat_id,
                    message_id,
                    from_id,
                    date,
                    text,
                    raw_json,
                },
            )
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn chat(id: i64, kind: &str) -> Chat {
        serde_json::from_value(serde_json::json!({"id": id, "type": kind, "title": "Rust"}))
            .unwrap()
    }

    fn user(id: i64, first: &str, last: Option<&str>, username: Option<&str>) -> User {
        User {
            id,
            is_bot: false,
            first_name: first.to_string(),
            last_name: last.map(String::from),
            username: username.map(String::from),
            language_code: None,
        }
    }

    fn message(chat_id: i64, message_id: i64, date: i64, text: &str) -> Message {
        serde_json::from_value(serde_json::json!({
            "message_id": message_id,
            "date": date,
            "chat": {"id": chat_id, "type": "supergroup", "title": "Rust"},
            "from": {"id": 5, "first_name": "Ferris"},
            "text": text,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn chat_upsert_refreshes_title() {
        let db = Database::new(":memory:").await.unwrap();
        let mut c = chat(-100, "supergroup");
        db.chats().upsert(&c).await.unwrap();
        c.title = Some("Rust (offtopic)".to_string());
        db.chats().upsert(&c).await.unwrap();

        let stored = db.chats().get(-100).await.unwrap().unwrap();
        assert_eq!(stored.kind, ChatKind::Supergroup);
        assert_eq!(stored.display_name(), "Rust (offtopic)");
        assert_eq!(db.chats().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn user_search_forms() {
        let db = Database::new(":memory:").await.unwrap();
        let users = db.users();
        users.upsert(&user(1, "Ada", Some("Lovelace"), Some("ada"))).await.unwrap();
        users.upsert(&user(2, "Ada", Some("Byron"), None)).await.unwrap();
        users.upsert(&user(3, "Grace", Some("Hopper"), Some("grace"))).await.unwrap();

        let ids = |v: Vec<UserRecord>| v.into_iter().map(|u| u.id).collect::<Vec<_>>();

        assert_eq!(ids(users.search("@Ada").await.unwrap()), vec![1, 2]);
        assert_eq!(ids(users.search("@grace").await.unwrap()), vec![3]);
        assert_eq!(ids(users.search("Lovelace Ada").await.unwrap()), vec![1]);
        assert_eq!(ids(users.search("Ada Byron").await.unwrap()), vec![2]);
        assert!(users.search("nobody").await.unwrap().is_empty());
        assert!(users.search("  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_message_is_ignored() {
        let db = Database::new(":memory:").await.unwrap();
        let msg = message(-100, 1, 1_700_000_000, "hello");

        assert!(db.messages().insert(&msg).await.unwrap());
        assert!(!db.messages().insert(&msg).await.unwrap());

        let stored = db.messages().get(-100, 1).await.unwrap().unwrap();
        assert_eq!(stored.text.as_deref(), Some("hello"));
        assert_eq!(stored.from_id, Some(5));
        assert_eq!(stored.message().unwrap(), msg);
    }

    #[tokio::test]
    async fn date_navigation_uses_utc() {
        let db = Database::new(":memory:").await.unwrap();
        // 2023-12-31 23:59:59 UTC, 2024-01-01 00:00:00 UTC, 2024-02-15 12:00:00 UTC
        for (id, date) in [(1, 1_704_067_199), (2, 1_704_067_200), (3, 1_707_998_400)] {
            db.messages()
                .insert(&message(-100, id, date, "x"))
                .await
                .unwrap();
        }
        db.messages()
            .insert(&message(-200, 1, 1_704_067_200, "other chat"))
            .await
            .unwrap();

        let repo = db.messages();
        assert_eq!(repo.years(-100).await.unwrap(), vec![2023, 2024]);
        assert_eq!(repo.months(-100, 2024).await.unwrap(), vec![1, 2]);
        assert_eq!(repo.days(-100, 2024, 2).await.unwrap(), vec![15]);
        assert_eq!(repo.days(-100, 2023, 12).await.unwrap(), vec![31]);

        let day = repo.for_day(-100, 2024, 1, 1).await.unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].message_id, 2);

        assert!(repo.for_day(-100, 2024, 2, 30).await.unwrap().is_empty());
        assert!(repo.months(-100, 2025).await.unwrap().is_empty());
    }
}
