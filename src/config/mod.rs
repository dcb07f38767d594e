//! Session configuration.
//!
//! A [`SessionConfig`] is assembled with chained `with_*` setters and is
//! immutable once handed to a session. Callback slots are never unset:
//! the defaults are no-op closures, so the session can always invoke them
//! without checking.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::SdkError;

/// Callback receiving one animation frame and the end-of-sequence flag.
pub type FrameCallback = Arc<dyn Fn(Vec<u8>, bool) + Send + Sync>;

/// Callback receiving asynchronous session errors.
pub type ErrorCallback = Arc<dyn Fn(SdkError) + Send + Sync>;

/// Callback invoked after the connection has been closed.
pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;

/// How credentials travel during the WebSocket upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthTransport {
    /// App id and token as `X-App-ID` / `X-Session-Key` headers (default).
    #[default]
    Headers,
    /// App id and token as `appId` / `sessionKey` query parameters.
    QueryParams,
}

/// Audio format the client streams.
///
/// The wire encoding is fixed to 16-bit little-endian PCM without
/// transport compression; only rate and bitrate are configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSettings {
    /// Samples per second.
    pub sample_rate: u32,
    /// Bits per second.
    pub bitrate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        // 16 kHz mono 16-bit PCM.
        Self {
            sample_rate: 16_000,
            bitrate: 256_000,
        }
    }
}

/// Optional egress destination forwarded in the configure message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressConfig {
    /// Destination URL the service should publish to.
    pub url: String,
    /// Stream key for the destination, if it needs one.
    pub stream_key: Option<String>,
}

/// Configuration used to build an [`AvatarSession`](crate::AvatarSession).
#[derive(Clone)]
pub struct SessionConfig {
    /// API key for the console token exchange.
    pub api_key: String,
    /// Application identifier presented during the WebSocket upgrade.
    pub app_id: String,
    /// Avatar identifier, always sent as the `id` query parameter.
    pub avatar_id: String,
    /// Requested session-token expiry instant.
    pub expire_at: Option<DateTime<Utc>>,
    /// Optional model version forwarded in the token request.
    pub model_version: Option<String>,
    /// Console (token service) base URL.
    pub console_endpoint: String,
    /// Streaming ingress base URL.
    pub ingress_endpoint: String,
    /// Credential transport for the upgrade request.
    pub auth_transport: AuthTransport,
    /// Audio format parameters.
    pub audio: AudioSettings,
    /// Optional egress destination.
    pub egress: Option<EgressConfig>,
    /// Root cancellation token; each connection derives a child from it.
    pub cancel: CancellationToken,
    pub(crate) on_frame: FrameCallback,
    pub(crate) on_error: ErrorCallback,
    pub(crate) on_close: CloseCallback,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            app_id: String::new(),
            avatar_id: String::new(),
            expire_at: None,
            model_version: None,
            console_endpoint: String::new(),
            ingress_endpoint: String::new(),
            auth_transport: AuthTransport::default(),
            audio: AudioSettings::default(),
            egress: None,
            cancel: CancellationToken::new(),
            on_frame: Arc::new(|_, _| {}),
            on_error: Arc::new(|_| {}),
            on_close: Arc::new(|| {}),
        }
    }
}

impl SessionConfig {
    /// Create an empty configuration with no-op callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key used for the token exchange.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set the application identifier.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Set the avatar identifier.
    pub fn with_avatar_id(mut self, avatar_id: impl Into<String>) -> Self {
        self.avatar_id = avatar_id.into();
        self
    }

    /// Set the requested token expiry instant.
    pub fn with_expire_at(mut self, expire_at: DateTime<Utc>) -> Self {
        self.expire_at = Some(expire_at);
        self
    }

    /// Set the model version forwarded in the token request.
    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    /// Set the console (token service) base URL.
    pub fn with_console_endpoint(mut self, url: impl Into<String>) -> Self {
        self.console_endpoint = url.into();
        self
    }

    /// Set the streaming ingress base URL.
    pub fn with_ingress_endpoint(mut self, url: impl Into<String>) -> Self {
        self.ingress_endpoint = url.into();
        self
    }

    /// Select how credentials travel during the upgrade.
    pub fn with_auth_transport(mut self, transport: AuthTransport) -> Self {
        self.auth_transport = transport;
        self
    }

    /// Set the audio format parameters.
    pub fn with_audio(mut self, audio: AudioSettings) -> Self {
        self.audio = audio;
        self
    }

    /// Set the egress destination.
    pub fn with_egress(mut self, egress: EgressConfig) -> Self {
        self.egress = Some(egress);
        self
    }

    /// Supply a cancellation token the session's tasks observe.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register the animation frame callback.
    pub fn with_on_frame(
        mut self,
        handler: impl Fn(Vec<u8>, bool) + Send + Sync + 'static,
    ) -> Self {
        self.on_frame = Arc::new(handler);
        self
    }

    /// Register the asynchronous error callback.
    pub fn with_on_error(mut self, handler: impl Fn(SdkError) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(handler);
        self
    }

    /// Register the close callback.
    pub fn with_on_close(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Arc::new(handler);
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("api_key", &"<redacted>")
            .field("app_id", &self.app_id)
            .field("avatar_id", &self.avatar_id)
            .field("expire_at", &self.expire_at)
            .field("model_version", &self.model_version)
            .field("console_endpoint", &self.console_endpoint)
            .field("ingress_endpoint", &self.ingress_endpoint)
            .field("auth_transport", &self.auth_transport)
            .field("audio", &self.audio)
            .field("egress", &self.egress)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.audio.bitrate, 256_000);
        assert_eq!(config.auth_transport, AuthTransport::Headers);
        assert!(config.egress.is_none());

        // Callback slots are never unset.
        (config.on_frame)(vec![1, 2, 3], true);
        (config.on_error)(SdkError::NotConnected);
        (config.on_close)();
    }

    #[test]
    fn test_builder_chaining() {
        let config = SessionConfig::new()
            .with_api_key("key")
            .with_app_id("app")
            .with_avatar_id("avatar")
            .with_console_endpoint("https://console.example")
            .with_ingress_endpoint("https://ingress.example")
            .with_auth_transport(AuthTransport::QueryParams);

        assert_eq!(config.api_key, "key");
        assert_eq!(config.app_id, "app");
        assert_eq!(config.avatar_id, "avatar");
        assert_eq!(config.auth_transport, AuthTransport::QueryParams);
    }

    #[test]
    fn test_registered_callbacks_fire() {
        let hits = Arc::new(AtomicUsize::new(0));
        let frame_hits = hits.clone();
        let close_hits = hits.clone();

        let config = SessionConfig::new()
            .with_on_frame(move |_, _| {
                frame_hits.fetch_add(1, Ordering::SeqCst);
            })
            .with_on_close(move || {
                close_hits.fetch_add(1, Ordering::SeqCst);
            });

        (config.on_frame)(vec![], false);
        (config.on_close)();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = SessionConfig::new().with_api_key("secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
