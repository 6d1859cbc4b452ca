//! Archive web view and Prometheus endpoint.
//!
//! Runs on its own task. Pages are askama templates under `templates/`:
//!
//! ```text
//! /                               chats by kind
//! /chat/:chat                     years with messages
//! /chat/:chat/:year               months
//! /chat/:chat/:year/:month        days
//! /chat/:chat/:year/:month/:day   messages
//! /static/*                       mirrored media and profile photos
//! /metrics                        Prometheus text format
//! ```

use crate::db::{ChatRecord, DbError};
use crate::state::AppState;
use askama::Template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Router, routing::get};
use chatlog_proto::{ChatKind, MediaKind, Message};
use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Page failures, rendered as plain-text error responses.
#[derive(Debug)]
pub enum PageError {
    BadParam(&'static str),
    Store(DbError),
    Render(askama::Error),
}

impl From<DbError> for PageError {
    fn from(e: DbError) -> Self {
        PageError::Store(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::BadParam(what) => {
                warn!(param = what, "Bad path parameter");
                (StatusCode::BAD_REQUEST, format!("{what} is not an integer")).into_response()
            }
            PageError::Store(e) => {
                error!(error = %e, "Archive query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
            PageError::Render(e) => {
                error!(error = %e, "Page template failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}

fn param<T: FromStr>(raw: &str, what: &'static str) -> Result<T, PageError> {
    raw.parse().map_err(|_| PageError::BadParam(what))
}

fn render(page: impl Template) -> Result<Html<String>, PageError> {
    page.render().map(Html).map_err(PageError::Render)
}

/// Build the router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.storage.static_dir();
    Router::new()
        .route("/", get(index))
        .route("/chat/:chat", get(chat))
        .route("/chat/:chat/:year", get(year))
        .route("/chat/:chat/:year/:month", get(month))
        .route("/chat/:chat/:year/:month/:day", get(day))
        .route("/metrics", get(metrics_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the web view until the listener fails.
pub async fn run_http_server(state: Arc<AppState>, addr: SocketAddr) {
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind HTTP server");
            return;
        }
    };
    info!(%addr, "Web view listening");

    if let Err(e) = axum::serve(listener, router(state)).await {
        error!(error = %e, "HTTP server error");
    }
}

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, PageError> {
    let chats = state.db.chats().list().await?;
    render(index_page(&chats))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Path(chat): Path<String>,
) -> Result<Html<String>, PageError> {
    let chat: i64 = param(&chat, "Chat ID")?;
    let years = state.db.messages().years(chat).await?;
    render(table_page("Years", format!("/chat/{chat}"), &years, 3))
}

async fn year(
    State(state): State<Arc<AppState>>,
    Path((chat, year)): Path<(String, String)>,
) -> Result<Html<String>, PageError> {
    let chat: i64 = param(&chat, "Chat ID")?;
    let year: i32 = param(&year, "Year")?;
    let months = state.db.messages().months(chat, year).await?;
    render(table_page("Months", format!("/chat/{chat}/{year}"), &months, 4))
}

async fn month(
    State(state): State<Arc<AppState>>,
    Path((chat, year, month)): Path<(String, String, String)>,
) -> Result<Html<String>, PageError> {
    let chat: i64 = param(&chat, "Chat ID")?;
    let year: i32 = param(&year, "Year")?;
    let month: u32 = param(&month, "Month")?;
    let days = state.db.messages().days(chat, year, month).await?;
    render(table_page("Days", format!("/chat/{chat}/{year}/{month}"), &days, 5))
}

async fn day(
    State(state): State<Arc<AppState>>,
    Path((chat, year, month, day)): Path<(String, String, String, String)>,
) -> Result<Html<String>, PageError> {
    let chat: i64 = param(&chat, "Chat ID")?;
    let year: i32 = param(&year, "Year")?;
    let month: u32 = param(&month, "Month")?;
    let day: u32 = param(&day, "Day")?;
    render(day_page(&state, chat, year, month, day).await?)
}

struct ChatLink {
    id: i64,
    name: String,
}

struct ChatSection {
    name: &'static str,
    chats: Vec<ChatLink>,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage {
    sections: Vec<ChatSection>,
}

/// Chat lists for the front page; empty sections are left out.
fn index_page(chats: &[ChatRecord]) -> IndexPage {
    let mut groups = Vec::new();
    let mut users = Vec::new();
    let mut channels = Vec::new();
    for chat in chats {
        let link = ChatLink {
            id: chat.id,
            name: chat.display_name(),
        };
        match chat.kind {
            ChatKind::Group | ChatKind::Supergroup => groups.push(link),
            ChatKind::Private => users.push(link),
            ChatKind::Channel => channels.push(link),
            ChatKind::Unknown => {}
        }
    }

    let sections = [("Groups", groups), ("Users", users), ("Channels", channels)]
        .into_iter()
        .filter(|(_, chats)| !chats.is_empty())
        .map(|(name, chats)| ChatSection { name, chats })
        .collect();
    IndexPage { sections }
}

#[derive(Template)]
#[template(path = "table.html")]
struct TablePage {
    title: &'static str,
    base: String,
    rows: Vec<Vec<Option<String>>>,
}

/// Links laid out `columns` to a row; the last row is padded with empty cells.
fn table_page<T: Display>(title: &'static str, base: String, items: &[T], columns: usize) -> TablePage {
    let rows = items
        .chunks(columns)
        .map(|chunk| {
            let mut row: Vec<Option<String>> = chunk.iter().map(|i| Some(i.to_string())).collect();
            row.resize(columns, None);
            row
        })
        .collect();
    TablePage { title, base, rows }
}

fn url_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:https?|ftp)://[\w\-]+(?:\.[\w\-]+)+(?:[\w\-.,@?^=%&;:/~+#]*[\w\-@?^=%&;/~+#])?",
        )
        .ok()
    })
    .as_ref()
}

/// Escape message text, turn URLs into links and newlines into breaks.
///
/// The result is markup and goes into templates unescaped.
pub fn linkify(raw: &str) -> String {
    let escaped = html_escape::encode_text(raw);
    let linked = match url_regex() {
        Some(re) => re.replace_all(&escaped, r#"<a href="$0">$0</a>"#).into_owned(),
        None => escaped.into_owned(),
    };
    linked.replace('\n', "<br/>")
}

fn time_of(date: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(date, 0)
}

fn media_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "Audio in message",
        MediaKind::Document => "Document in message",
        MediaKind::Video => "Video in message",
        MediaKind::Voice => "Voice in message",
        MediaKind::ChatPhoto => "New chat photo",
        MediaKind::Photo | MediaKind::Sticker => "Image in message",
    }
}

enum MediaShow {
    Missing,
    Picture,
    Sticker,
    Link,
}

struct MediaView {
    label: &'static str,
    name: String,
    show: MediaShow,
}

struct ReplyQuote {
    anchor: String,
    text: String,
}

struct MessageRow {
    photo: Option<String>,
    time: String,
    user: String,
    reply: Option<ReplyQuote>,
    body: String,
    media: Vec<MediaView>,
}

#[derive(Template)]
#[template(path = "day.html")]
struct DayPage {
    rows: Vec<MessageRow>,
}

async fn media_views(state: &AppState, msg: &Message) -> Vec<MediaView> {
    let mut refs = msg.media_refs();
    // Only the largest photo size is shown.
    let largest = msg.largest_photo().map(|p| p.file_id.clone());
    refs.retain(|r| r.kind != MediaKind::Photo || Some(&r.file_id) == largest.as_ref());

    let mut views = Vec::with_capacity(refs.len());
    for media in refs {
        let label = media_label(media.kind);
        let view = match state.files.short_name(&media.file_id).await {
            Ok(name) => MediaView {
                label,
                name,
                show: match media.kind {
                    MediaKind::Photo => MediaShow::Picture,
                    MediaKind::Sticker => MediaShow::Sticker,
                    _ => MediaShow::Link,
                },
            },
            Err(e) => {
                warn!(file_id = %media.file_id, error = %e, "No short name for media");
                MediaView {
                    label,
                    name: String::new(),
                    show: MediaShow::Missing,
                }
            }
        };
        views.push(view);
    }
    views
}

async fn message_row(state: &AppState, msg: &Message) -> MessageRow {
    let time = time_of(msg.date)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();

    let reply = msg.reply_to_message.as_deref().map(|replied| ReplyQuote {
        anchor: time_of(replied.date)
            .map(|t| {
                format!(
                    "/chat/{}/{}/{}/{}#{}",
                    msg.chat.id,
                    t.year(),
                    t.month(),
                    t.day(),
                    t.format("%H:%M:%S")
                )
            })
            .unwrap_or_default(),
        text: replied.body().unwrap_or_default().to_string(),
    });

    let photo = match msg.from.as_ref() {
        Some(from) => state.photos.filename(from.id).await,
        None => None,
    };

    MessageRow {
        photo,
        time,
        user: msg.from.as_ref().map(ToString::to_string).unwrap_or_default(),
        reply,
        body: linkify(msg.body().unwrap_or_default()),
        media: media_views(state, msg).await,
    }
}

/// Message table for one UTC day of a chat.
async fn day_page(
    state: &AppState,
    chat: i64,
    year: i32,
    month: u32,
    day: u32,
) -> Result<DayPage, DbError> {
    let records = state.db.messages().for_day(chat, year, month, day).await?;
    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let msg = record.message()?;
        rows.push(message_row(state, &msg).await);
    }
    Ok(DayPage { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{group, text_message};
    use crate::telegram::fake::user;

    fn record(id: i64, kind: ChatKind, title: Option<&str>, first: Option<&str>) -> ChatRecord {
        ChatRecord {
            id,
            kind,
            title: title.map(str::to_string),
            username: None,
            first_name: first.map(str::to_string),
            last_name: None,
        }
    }

    #[test]
    fn index_groups_chats_by_kind() {
        let html = index_page(&[
            record(-1, ChatKind::Supergroup, Some("Rust <3"), None),
            record(2, ChatKind::Private, None, Some("Bob")),
        ])
        .render()
        .unwrap();
        assert!(html.contains("<h2>Groups:</h2>"));
        assert!(html.contains("<a href=\"/chat/-1\">Rust &lt;3</a>"));
        assert!(html.contains("<h2>Users:</h2>"));
        assert!(!html.contains("Channels"));
    }

    #[test]
    fn tables_pad_the_last_row() {
        let page = table_page("Days", "/chat/1/2024/5".to_string(), &[1, 2, 3, 4, 5, 6], 5);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[1], vec![Some("6".to_string()), None, None, None, None]);

        let html = page.render().unwrap();
        assert_eq!(html.matches("<tr>").count(), 2);
        assert_eq!(html.matches("<td></td>").count(), 4);
        let decoded = html_escape::decode_html_entities(&html);
        assert!(decoded.contains("<a href=\"/chat/1/2024/5/6\">6</a>"));

        let empty = table_page::<u32>("Days", "/x".to_string(), &[], 5).render().unwrap();
        assert!(!empty.contains("<table>"));
        assert!(empty.contains("Telegram logs"));
    }

    #[test]
    fn text_is_escaped_then_linked() {
        assert_eq!(
            linkify("see https://example.org/a?b=1&c=2\n<b>"),
            "see <a href=\"https://example.org/a?b=1&amp;c=2\">https://example.org/a?b=1&amp;c=2</a><br/>&lt;b&gt;"
        );
    }

    #[test]
    fn bad_params_are_rejected() {
        assert_eq!(param::<i64>("-100", "Chat ID").unwrap(), -100);
        let err = param::<i64>("abc", "Chat ID").unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        let err = PageError::Store(DbError::NotFound("x".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn day_page_renders_archived_messages() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _fake) = crate::state::tests::state(dir.path()).await;

        let first = text_message(group(-1), 1, user(2, "Bob"), "hello <world>");
        let mut second = text_message(group(-1), 2, user(3, "Eve"), "hi");
        second.reply_to_message = Some(Box::new(first.clone()));
        state.archive.store(&first).await.unwrap();
        state.archive.store(&second).await.unwrap();

        // 1_700_000_000 is 2023-11-14 22:13:20 UTC
        let html = day_page(&state, -1, 2023, 11, 14).await.unwrap().render().unwrap();
        assert!(html.contains("<strong>Bob</strong>"));
        assert!(html.contains("hello &lt;world&gt;"));
        assert!(html.contains("id=\"22:13:20\""));
        assert!(html.contains("no image"));
        assert!(!html.contains("<world>"));
        let decoded = html_escape::decode_html_entities(&html);
        assert!(decoded.contains("<p class=\"reply\"><a href=\"/chat/-1/2023/11/14#22:13:20\">"));

        assert!(day_page(&state, -1, 2023, 11, 15).await.unwrap().rows.is_empty());
        assert_eq!(state.db.messages().years(-1).await.unwrap(), vec![2023]);
    }
}
