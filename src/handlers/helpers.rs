//! Helpers shared by several handlers.

use crate::db::{Database, DbError, UserRecord};
use std::time::Duration;

/// Result of looking up a user by a name typed in a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    NotFound,
    Found(UserRecord),
    Ambiguous(Vec<UserRecord>),
}

/// Find the archived user a command argument refers to.
pub async fn resolve_user(db: &Database, query: &str) -> Result<UserLookup, DbError> {
    let mut matches = db.users().search(query).await?;
    Ok(match matches.len() {
        0 => UserLookup::NotFound,
        1 => UserLookup::Found(matches.remove(0)),
        _ => UserLookup::Ambiguous(matches),
    })
}

/// Compact human duration, e.g. `9m59s`.
pub fn format_remaining(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m{s}s"),
        _ => format!("{h}h{m}m{s}s"),
    }
}

/// Cut `text` to at most `max` bytes on a char boundary, marking the cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n…", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::fake::user;

    #[test]
    fn remaining_formats() {
        assert_eq!(format_remaining(Duration::from_secs(7)), "7s");
        assert_eq!(format_remaining(Duration::from_millis(599_500)), "9m59s");
        assert_eq!(format_remaining(Duration::from_secs(3_725)), "1h2m5s");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é\n…");
    }

    #[tokio::test]
    async fn lookup_outcomes() {
        let db = Database::new(":memory:").await.unwrap();
        let mut ada = user(1, "Ada");
        ada.username = Some("ada".to_string());
        db.users().upsert(&ada).await.unwrap();
        db.users().upsert(&user(2, "Bob")).await.unwrap();
        db.users().upsert(&user(3, "Bob")).await.unwrap();

        assert!(matches!(
            resolve_user(&db, "@ada").await.unwrap(),
            UserLookup::Found(u) if u.id == 1
        ));
        assert!(matches!(
            resolve_user(&db, "Bob").await.unwrap(),
            UserLookup::Ambiguous(list) if list.len() == 2
        ));
        assert_eq!(resolve_user(&db, "Eve").await.unwrap(), UserLookup::NotFound);
    }
}
