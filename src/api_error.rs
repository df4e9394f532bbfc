//! One error shape for every failed backend call.
//!
//! Call sites used to branch on status codes themselves, each with its own
//! wording. [`ApiError::from_response`] does that once: status code plus
//! response body in, `{kind, message, field_errors}` out, ready to show.
//!
//! The backend is Laravel, so validation failures (422) look like:
//!
//! ```json
//! { "message": "The given data was invalid.",
//!   "errors": { "title": ["The title field is required."],
//!               "image": ["The image may not be greater than 2048 kilobytes."] } }
//! ```
//!
//! Field messages are flattened into a single line in field order.

use crate::types::Notice;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// No response: DNS, connection refused, TLS, reset.
    Network,
    /// The request was aborted by the client-side timeout.
    Timeout,
    Unauthorized,
    Forbidden,
    NotFound,
    PayloadTooLarge,
    Validation,
    Server,
    Other(u16),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, Vec<String>>,
}

/// The parts of an error body we understand. Anything else is ignored.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, FieldMessages>,
}

/// Laravel sends arrays; some hand-written endpoints send a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldMessages {
    Many(Vec<String>),
    One(String),
}

impl FieldMessages {
    fn into_vec(self) -> Vec<String> {
        match self {
            FieldMessages::Many(v) => v,
            FieldMessages::One(s) => vec![s],
        }
    }
}

impl ApiErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ApiErrorKind::Unauthorized,
            403 => ApiErrorKind::Forbidden,
            404 => ApiErrorKind::NotFound,
            413 => ApiErrorKind::PayloadTooLarge,
            422 => ApiErrorKind::Validation,
            500..=599 => ApiErrorKind::Server,
            other => ApiErrorKind::Other(other),
        }
    }

    fn default_message(self) -> String {
        match self {
            ApiErrorKind::Network => {
                "Unable to reach the server. Check your connection and try again.".into()
            }
            ApiErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ApiErrorKind::Unauthorized => "Your session has expired. Please log in again.".into(),
            ApiErrorKind::Forbidden => "You do not have permission to do that.".into(),
            ApiErrorKind::NotFound => "The requested item could not be found.".into(),
            ApiErrorKind::PayloadTooLarge => {
                "The upload is too large for the server. Try a smaller image.".into()
            }
            ApiErrorKind::Validation => "Some fields are invalid.".into(),
            ApiErrorKind::Server => "Server error. Please try again later.".into(),
            ApiErrorKind::Other(status) => format!("Request failed (HTTP {status})."),
        }
    }
}

impl ApiError {
    /// Normalize an HTTP error response.
    ///
    /// `body` may be empty or non-JSON; then the per-kind default message
    /// is used.
    pub fn from_response(status: u16, body: &str) -> Self {
        let kind = ApiErrorKind::from_status(status);
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

        let field_errors: BTreeMap<String, Vec<String>> = parsed
            .errors
            .into_iter()
            .map(|(field, msgs)| (field, msgs.into_vec()))
            .filter(|(_, msgs)| !msgs.is_empty())
            .collect();

        let message = if !field_errors.is_empty() {
            field_errors
                .values()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            // Server-side messages on 5xx are stack-trace territory; keep ours.
            match (kind, parsed.message) {
                (ApiErrorKind::Server, _) | (_, None) => kind.default_message(),
                (_, Some(msg)) if msg.trim().is_empty() => kind.default_message(),
                (_, Some(msg)) => msg,
            }
        };

        Self {
            kind,
            message,
            field_errors,
        }
    }

    pub fn network(detail: impl fmt::Display) -> Self {
        tracing::debug!(%detail, "network failure");
        Self {
            kind: ApiErrorKind::Network,
            message: ApiErrorKind::Network.default_message(),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: ApiErrorKind::Timeout,
            message: ApiErrorKind::Timeout.default_message(),
            field_errors: BTreeMap::new(),
        }
    }

    /// True when the caller must wipe stored credentials and send the user
    /// to the login page.
    pub fn requires_reauth(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }

    pub fn notice(&self) -> Notice {
        Notice::error(self.message.clone())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiErrorKind::from_status(401), ApiErrorKind::Unauthorized);
        assert_eq!(ApiErrorKind::from_status(403), ApiErrorKind::Forbidden);
        assert_eq!(ApiErrorKind::from_status(404), ApiErrorKind::NotFound);
        assert_eq!(ApiErrorKind::from_status(413), ApiErrorKind::PayloadTooLarge);
        assert_eq!(ApiErrorKind::from_status(422), ApiErrorKind::Validation);
        assert_eq!(ApiErrorKind::from_status(500), ApiErrorKind::Server);
        assert_eq!(ApiErrorKind::from_status(503), ApiErrorKind::Server);
        assert_eq!(ApiErrorKind::from_status(409), ApiErrorKind::Other(409));
    }

    #[test]
    fn validation_errors_are_flattened() {
        let body = r#"{
            "message": "The given data was invalid.",
            "errors": {
                "title": ["The title field is required."],
                "image": ["The image must be a file of type: jpeg, png.", "The image may not be greater than 2048 kilobytes."]
            }
        }"#;
        let err = ApiError::from_response(422, body);

        assert_eq!(err.kind, ApiErrorKind::Validation);
        assert_eq!(err.field_errors.len(), 2);
        // BTreeMap order: image before title
        assert_eq!(
            err.message,
            "The image must be a file of type: jpeg, png. \
             The image may not be greater than 2048 kilobytes. \
             The title field is required."
        );
    }

    #[test]
    fn single_string_field_error_accepted() {
        let err = ApiError::from_response(422, r#"{"errors": {"email": "Taken."}}"#);
        assert_eq!(err.message, "Taken.");
        assert_eq!(err.field_errors["email"], vec!["Taken.".to_string()]);
    }

    #[test]
    fn body_message_used_without_field_errors() {
        let err = ApiError::from_response(403, r#"{"message": "Admins only."}"#);
        assert_eq!(err.kind, ApiErrorKind::Forbidden);
        assert_eq!(err.message, "Admins only.");
    }

    #[test]
    fn server_message_is_not_leaked() {
        let err = ApiError::from_response(500, r#"{"message": "SQLSTATE[42S22]"}"#);
        assert_eq!(err.message, "Server error. Please try again later.");
    }

    #[test]
    fn non_json_body_uses_default() {
        let err = ApiError::from_response(413, "<html>413 Request Entity Too Large</html>");
        assert_eq!(err.kind, ApiErrorKind::PayloadTooLarge);
        assert_eq!(
            err.message,
            "The upload is too large for the server. Try a smaller image."
        );
    }

    #[test]
    fn unauthorized_requires_reauth() {
        let err = ApiError::from_response(401, "");
        assert!(err.requires_reauth());
        assert!(!ApiError::from_response(403, "").requires_reauth());
    }

    #[test]
    fn other_status_mentions_code() {
        let err = ApiError::from_response(418, "");
        assert_eq!(err.message, "Request failed (HTTP 418).");
    }

    #[test]
    fn network_and_timeout() {
        assert_eq!(ApiError::network("connection refused").kind, ApiErrorKind::Network);
        assert_eq!(ApiError::timeout().kind, ApiErrorKind::Timeout);
    }

    #[test]
    fn notice_is_error_level() {
        let notice = ApiError::timeout().notice();
        assert_eq!(notice.level, crate::types::NoticeLevel::Error);
        assert_eq!(notice.message, "The request timed out. Please try again.");
    }

    #[test]
    fn serializes_as_tagged_shape() {
        let json = serde_json::to_value(ApiError::from_response(404, "")).unwrap();
        assert_eq!(json["kind"], "not_found");
        assert!(json.get("field_errors").is_none());
    }
}
