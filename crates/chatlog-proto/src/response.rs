//! The `{ ok, result, description }` envelope every Bot API call returns.

use crate::error::ResponseError;
use serde::Deserialize;

/// Extra hints attached to some failed responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseParameters {
    /// The group has been migrated to a supergroup with this id.
    pub migrate_to_chat_id: Option<i64>,
    /// Seconds left before the request may be repeated.
    pub retry_after: Option<u64>,
}

/// Raw response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// `true` when `result` is populated.
    pub ok: bool,
    /// Method result on success.
    pub result: Option<T>,
    /// Error description on failure.
    pub description: Option<String>,
    /// Error code on failure.
    pub error_code: Option<i64>,
    /// Optional failure hints.
    pub parameters: Option<ResponseParameters>,
}

impl<T> ApiResponse<T> {
    /// Convert the envelope into a `Result`.
    ///
    /// An `ok: true` response without a `result` is reported as an error
    /// with code 0, since every method used by `chatlogd` returns a value.
    pub fn into_result(self) -> Result<T, ResponseError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (ok, _) => Err(ResponseError {
                code: self.error_code.unwrap_or(0),
                description: self.description.unwrap_or_else(|| {
                    if ok {
                        "empty result".to_string()
                    } else {
                        "unknown error".to_string()
                    }
                }),
                retry_after: self.parameters.and_then(|p| p.retry_after),
            }),
        }
    }
}
