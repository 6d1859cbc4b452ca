//! Error types for Bot API responses.

use thiserror::Error;

/// A failed Bot API call, as reported by the `ok: false` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("api error {code}: {description}")]
pub struct ResponseError {
    /// Numeric error code (mirrors the HTTP status, 0 when absent).
    pub code: i64,
    /// Human readable description supplied by the server.
    pub description: String,
    /// Seconds to wait before retrying, for flood-control responses.
    pub retry_after: Option<u64>,
}

impl ResponseError {
    /// Whether the error reports that the target user is not (or no longer)
    /// a member of the chat.
    ///
    /// Kick and unban treat this as success: the member is already gone.
    pub fn is_not_member(&self) -> bool {
        let d = self.description.to_ascii_lowercase();
        d.contains("user not found")
            || d.contains("participant_id_invalid")
            || d.contains("user is not a member")
            || d.contains("member not found")
            || d.contains("user_not_participant")
    }

    /// Whether the error is a flood-control rejection.
    pub fn is_rate_limited(&self) -> bool {
        self.code == 429 || self.retry_after.is_some()
    }

    /// Whether the server could not parse the message's markup.
    pub fn is_parse_error(&self) -> bool {
        self.code == 400 && self.description.contains("can't parse entities")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(code: i64, description: &str) -> ResponseError {
        ResponseError {
            code,
            description: description.to_string(),
            retry_after: None,
        }
    }

    #[test]
    fn not_member_descriptions() {
        assert!(err(400, "Bad Request: USER_NOT_PARTICIPANT").is_not_member());
        assert!(err(400, "Bad Request: user not found").is_not_member());
        assert!(!err(400, "Bad Request: not enough rights to restrict/unrestrict chat member").is_not_member());
    }

    #[test]
    fn rate_limited_by_code() {
        assert!(err(429, "Too Many Requests: retry after 5").is_rate_limited());
        assert!(!err(403, "Forbidden").is_rate_limited());
    }

    #[test]
    fn markup_rejection() {
        assert!(err(400, "Bad Request: can't parse entities: Can't find end of the entity starting at byte offset 3").is_parse_error());
        assert!(!err(400, "Bad Request: chat not found").is_parse_error());
    }
}
