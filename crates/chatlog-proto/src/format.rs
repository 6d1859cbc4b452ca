//! Helpers for composing legacy-Markdown message text.

/// Escape the characters legacy Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wrap text in a fenced code block.
///
/// Backtick fences inside the text would close the block early, so they
/// are replaced with look-alike quotes.
pub fn code_block(text: &str) -> String {
    format!("```\n{}\n```", text.replace("```", "'''"))
}

/// A Markdown inline link.
///
/// The title is escaped; `)` in the URL is percent-encoded.
pub fn link(title: &str, url: &str) -> String {
    format!("[{}]({})", escape_markdown(title), url.replace(')', "%29"))
}

/// Public link to a message in a chat with a username.
pub fn message_link(chat_username: &str, message_id: i64) -> String {
    format!("https://t.me/{}/{}", chat_username, message_id)
}
