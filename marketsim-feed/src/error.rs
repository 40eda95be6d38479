use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure to turn a raw feed frame into a typed message.
///
/// The offending frame is dropped; the connection that delivered it stays open.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Json(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl DecodeError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}

/// All connection level errors generated in `marketsim-feed`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum FeedError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("read timeout: no data received for {0:?}")]
    ReadTimeout(Duration),

    #[error("failed to send command {command}: {reason}")]
    Command { command: String, reason: String },
}

impl FeedError {
    /// Determine if an error means the session is gone and the connection was lost.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            FeedError::Command { .. } => false,
            _ => true,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_is_terminal() {
        struct TestCase {
            input: FeedError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: is terminal w/ FeedError::Connect
                input: FeedError::Connect {
                    url: "ws://localhost:9000/market/ohlc".to_string(),
                    reason: "Connection refused".to_string(),
                },
                expected: true,
            },
            TestCase {
                // TC1: is terminal w/ FeedError::Socket
                input: FeedError::Socket("WebSocket protocol error".to_string()),
                expected: true,
            },
            TestCase {
                // TC2: is terminal w/ FeedError::ReadTimeout
                input: FeedError::ReadTimeout(Duration::from_secs(120)),
                expected: true,
            },
            TestCase {
                // TC3: is not terminal w/ FeedError::Command
                input: FeedError::Command {
                    command: "getAllTraderParameters".to_string(),
                    reason: "AlreadyClosed".to_string(),
                },
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_terminal();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_decode_error_from_serde_json() {
        let error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(DecodeError::from(error), DecodeError::Json(_)));
    }

    #[test]
    fn test_read_timeout_display_keeps_sub_second_precision() {
        assert_eq!(
            FeedError::ReadTimeout(Duration::from_millis(300)).to_string(),
            "read timeout: no data received for 300ms"
        );
        assert_eq!(
            FeedError::ReadTimeout(Duration::from_secs(120)).to_string(),
            "read timeout: no data received for 120s"
        );
    }

    #[test]
    fn test_decode_error_display() {
        let error = DecodeError::invalid("price", "must be > 0, got -1");
        assert_eq!(error.to_string(), "invalid field price: must be > 0, got -1");
    }
}
