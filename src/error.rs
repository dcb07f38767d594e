//! Avatar SDK error types.
//!
//! Errors fall into a few families that matter to callers:
//!
//! - **Configuration**: a required field was missing before any I/O happened.
//! - **Resource state**: the operation does not fit the session's current
//!   lifecycle state (not initialized, already started, not connected).
//! - **Transport**: HTTP or WebSocket level failures.
//! - **Protocol**: handshake sequencing violations and malformed payloads.
//! - **Service-reported**: errors the remote service sent back, either as
//!   token-response entries or as error envelopes on the stream.
//!
//! Connect-time HTTP rejections with a well-known status are mapped to a
//! stable [`SdkErrorCode`] via [`map_connect_status`]; everything else
//! falls back to a generic failure carrying the raw status and body.

use thiserror::Error;

use crate::wire::DecodeError;

/// Stable error codes surfaced by the SDK.
///
/// These codes are referenced by the v2 websocket API documentation and
/// must not be extended with guessed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkErrorCode {
    /// The session token has expired.
    SessionTokenExpired,
    /// The session token is invalid.
    SessionTokenInvalid,
    /// The application id is not recognized.
    AppIdUnrecognized,
    /// Unknown error.
    Unknown,
}

impl SdkErrorCode {
    /// Wire/documentation spelling of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            SdkErrorCode::SessionTokenExpired => "sessionTokenExpired",
            SdkErrorCode::SessionTokenInvalid => "sessionTokenInvalid",
            SdkErrorCode::AppIdUnrecognized => "appIDUnrecognized",
            SdkErrorCode::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SdkErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a WebSocket upgrade rejection status to a stable SDK error code.
///
/// v2 API mapping:
/// - 401 -> `sessionTokenExpired`
/// - 400 -> `sessionTokenInvalid`
/// - 404 -> `appIDUnrecognized`
///
/// Every other status returns `None` and the caller falls back to a
/// generic failure carrying the raw status and response body.
pub fn map_connect_status(status: u16) -> Option<SdkErrorCode> {
    match status {
        401 => Some(SdkErrorCode::SessionTokenExpired),
        400 => Some(SdkErrorCode::SessionTokenInvalid),
        404 => Some(SdkErrorCode::AppIdUnrecognized),
        _ => None,
    }
}

/// Avatar SDK errors.
#[derive(Error, Debug)]
pub enum SdkError {
    /// A required configuration field is missing or invalid.
    #[error("invalid session config: {0}")]
    Config(String),

    /// Start was called before Init succeeded.
    #[error("session not initialized")]
    NotInitialized,

    /// Start was called while a connection is already open.
    #[error("session already started")]
    AlreadyStarted,

    /// SendAudio was called without an open connection.
    #[error("websocket connection is not established")]
    NotConnected,

    /// Token request completed with a non-2xx status and no parsable
    /// error entries.
    #[error("session token request failed with status {0}")]
    TokenStatus(u16),

    /// Token request was rejected with service-reported error entries.
    #[error("session token rejected: {0}")]
    TokenRejected(String),

    /// Token response parsed but carried an empty token field.
    #[error("empty session token in response")]
    EmptyToken,

    /// WebSocket upgrade was rejected with a well-known status code.
    #[error("{code}: {message}")]
    Connect {
        /// Stable SDK error code for the rejection.
        code: SdkErrorCode,
        /// Human-readable detail.
        message: String,
    },

    /// WebSocket upgrade was rejected with an unmapped status code.
    #[error("websocket dial failed with status {status}: {body}")]
    ConnectRejected {
        /// Raw HTTP status of the rejection.
        status: u16,
        /// Response body text, possibly empty.
        body: String,
    },

    /// Handshake sequencing violation.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Error envelope reported by the service.
    #[error("avatar session error (connection_id={connection_id}, req_id={req_id}, code={code}): {message}")]
    Service {
        /// Server-assigned connection id, possibly empty.
        connection_id: String,
        /// Correlation id of the request the error refers to.
        req_id: String,
        /// Numeric service error code.
        code: u32,
        /// Human-readable message.
        message: String,
    },

    /// An error envelope arrived without a payload.
    #[error("error message missing payload")]
    MissingErrorPayload,

    /// The operation was cancelled before completing.
    #[error("operation cancelled")]
    Cancelled,

    /// WebSocket transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Inbound message failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// HTTP client failure.
    #[error("network error: {0}")]
    Network(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        SdkError::Network(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SdkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SdkError::Transport(err.to_string())
    }
}
