//! Error types for questclaim.

/// Top-level error type for polling, claiming and local persistence.
#[derive(Debug, thiserror::Error)]
pub enum QuestError {
    /// Network or timeout failure talking to an HTTP endpoint.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An HTTP endpoint answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, truncated for display.
        body: String,
    },

    /// Response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Local match store or seen-set persistence failure.
    #[error("store error: {0}")]
    Store(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Notification delivery failure.
    #[error("notify error: {0}")]
    Notify(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuestError {
    /// Build a [`QuestError::Status`] with the body cut to a loggable length.
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: truncate(body, 300),
        }
    }
}

impl From<reqwest::Error> for QuestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for QuestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Cut `text` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, QuestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_status() {
        let err = QuestError::status(403, "forbidden");
        assert_eq!(err.to_string(), "unexpected status 403: forbidden");
    }

    #[test]
    fn status_body_is_truncated() {
        let body = "x".repeat(1000);
        let QuestError::Status { body, .. } = QuestError::status(500, &body) else {
            unreachable!("status constructor builds Status");
        };
        assert_eq!(body.len(), 303);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn display_store() {
        let err = QuestError::Store("registry file is not a JSON object".into());
        assert_eq!(
            err.to_string(),
            "store error: registry file is not a JSON object"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: QuestError = io.into();
        assert!(matches!(err, QuestError::Io(_)));
    }

    #[test]
    fn json_errors_become_parse_errors() {
        let bad = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err: QuestError = bad.into();
        assert!(err.to_string().starts_with("parse error"));
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QuestError>();
    }
}
