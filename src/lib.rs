//! # Avatar SDK - Streaming Avatar Session Client
//!
//! Client library for the avatar rendering service: exchange an API key
//! for a short-lived session token, open a streaming WebSocket
//! connection, push PCM audio in correlated chunks, and receive animation
//! frames and error reports through callbacks.
//!
//! ## Session Lifecycle
//!
//! ```text
//! Client                      Console              Ingress
//!    |                           |                    |
//!    |-- POST /session-tokens -->|                    |   Init
//!    |<------ sessionToken ------|                    |
//!    |                           |                    |
//!    |-------- WebSocket upgrade (id, credentials) -->|   Start
//!    |-------- ConfigureSession (audio, egress) ----->|
//!    |<------- ConfirmSession (connection id) --------|
//!    |                           |                    |
//!    |======== AudioInput (req id, chunk, end) ======>|   SendAudio
//!    |<======= Animation (frame bytes, end) ==========|   (dispatcher)
//!    |<======= ServerError (code, message) ===========|
//!    |                           |                    |
//!    |-------- Close frame -------------------------->|   Close
//! ```
//!
//! ## Operations
//!
//! | Operation    | Blocking | Failure surface                           |
//! |--------------|----------|-------------------------------------------|
//! | `init`       | yes      | returned `Result`                         |
//! | `start`      | yes      | returned `Result`, socket closed on error |
//! | `send_audio` | yes      | returned `Result`, req id kept on error   |
//! | `close`      | yes      | returned `Result`, connection cleared     |
//! | dispatcher   | no       | `on_error` callback, then session close   |
//!
//! Failures after the dispatcher has started are asynchronous: they reach
//! the caller only through the error callback and are followed by a
//! session close. Per-message decode failures are the one non-fatal case;
//! they are reported and the loop keeps reading.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use avatar_sdk::{AvatarSession, SessionConfig};
//! use chrono::{Duration, Utc};
//!
//! let config = SessionConfig::new()
//!     .with_api_key(std::env::var("AVATAR_API_KEY")?)
//!     .with_app_id("my-app")
//!     .with_avatar_id("avatar-42")
//!     .with_expire_at(Utc::now() + Duration::minutes(10))
//!     .with_console_endpoint("https://console.example.com")
//!     .with_ingress_endpoint("https://ingress.example.com")
//!     .with_on_frame(|frame, is_final| {
//!         // feed frame bytes to the renderer
//!     })
//!     .with_on_error(|err| eprintln!("session error: {err}"));
//!
//! let session = AvatarSession::new(config);
//! session.init().await?;
//! let connection_id = session.start().await?;
//!
//! let req_id = session.send_audio(&pcm_chunk, false).await?;
//! session.send_audio(&last_chunk, true).await?;
//!
//! session.close().await?;
//! ```
//!
//! ## Concurrency
//!
//! The connection handle and the active correlation id live behind one
//! mutex, so `send_audio` and `close` are safe to call from different
//! tasks. The dispatcher runs on its own task and every callback
//! invocation is spawned on yet another task: a slow callback never
//! delays the next inbound read. Chunks within one correlation sequence
//! reach the wire in call order; frames reach the frame callback in wire
//! order at the dispatch point.
//!
//! ## Modules
//!
//! - [`session`]: the `AvatarSession` lifecycle (init/start/send/close)
//! - [`config`]: session configuration, auth transport, callbacks
//! - [`token`]: console session-token exchange
//! - [`wire`]: binary envelope codec
//! - [`logid`]: sortable correlation/log id generation
//! - [`error`]: error types and the stable SDK error codes

pub mod config;
pub mod error;
pub mod logid;
pub mod session;
pub mod token;
pub mod wire;

// Re-exports for convenience
pub use config::{AudioSettings, AuthTransport, EgressConfig, SessionConfig};
pub use error::{map_connect_status, Result, SdkError, SdkErrorCode};
pub use logid::generate_log_id;
pub use session::AvatarSession;
pub use token::TokenClient;
pub use wire::{Envelope, MessageKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Streaming protocol version sent in the configure message
pub const PROTOCOL_VERSION: &str = "2.0";
