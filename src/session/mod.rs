//! Avatar session lifecycle.
//!
//! [`AvatarSession`] composes the whole client side of the protocol:
//!
//! 1. [`init`](AvatarSession::init) exchanges the API key for a session
//!    token against the console.
//! 2. [`start`](AvatarSession::start) dials the ingress WebSocket,
//!    performs the configure/confirm handshake and spawns the inbound
//!    dispatcher.
//! 3. [`send_audio`](AvatarSession::send_audio) streams PCM chunks under
//!    a lazily generated correlation id.
//! 4. [`close`](AvatarSession::close) tears the connection down and fires
//!    the close callback.
//!
//! The connection handle and the active correlation id share one async
//! mutex, so `send_audio`, `close` and a racing `start` serialize against
//! each other instead of relying on caller discipline. `start` is
//! cancel-safe: the connection is only stored once the handshake
//! succeeded, so wrapping it in `tokio::time::timeout` and dropping the
//! future tears the half-open socket down.

mod dispatch;

use std::sync::{Arc, Mutex as StdMutex};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{AuthTransport, SessionConfig};
use crate::error::{map_connect_status, Result, SdkError};
use crate::logid::generate_log_id;
use crate::token::TokenClient;
use crate::wire::{AudioChunk, ConfigurePayload, Envelope};
use crate::PROTOCOL_VERSION;

const INGRESS_WEBSOCKET_PATH: &str = "/websocket";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// State of one open connection. Lives behind the session's connection
/// mutex together with the active correlation id so sends and closes
/// never observe each other halfway.
struct Connection {
    writer: WsWriter,
    req_id: Option<String>,
    cancel: CancellationToken,
}

/// State shared between the session handle and the dispatcher task.
pub(crate) struct SessionShared {
    pub(crate) config: SessionConfig,
    conn: Mutex<Option<Connection>>,
}

impl SessionShared {
    /// Report an asynchronous failure on its own task.
    pub(crate) fn emit_error(&self, err: SdkError) {
        let callback = self.config.on_error.clone();
        tokio::spawn(async move { callback(err) });
    }

    /// Close the connection if one is open.
    ///
    /// Best-effort close frame, unconditional socket close, cancel the
    /// dispatcher, clear the slot. The close callback fires (on its own
    /// task) whenever a connection was actually open, including when the
    /// close frame could not be sent; that send failure is still
    /// returned to the caller.
    pub(crate) async fn close_connection(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let Some(mut conn) = guard.take() else {
            return Ok(());
        };

        let sent = conn
            .writer
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })))
            .await;
        let _ = conn.writer.close().await;
        conn.cancel.cancel();
        drop(guard);

        tracing::debug!("avatar session connection closed");

        let callback = self.config.on_close.clone();
        tokio::spawn(async move { callback() });

        sent.map_err(|e| SdkError::Transport(format!("send close message: {e}")))
    }
}

/// An avatar session configured via [`SessionConfig`].
///
/// Constructed without I/O; all failures surface from the lifecycle
/// methods. The handle is cheap to share behind an `Arc` and its methods
/// take `&self`.
pub struct AvatarSession {
    shared: Arc<SessionShared>,
    token: StdMutex<Option<String>>,
    connection_id: StdMutex<Option<String>>,
}

impl AvatarSession {
    /// Create a new session from the configuration. Never fails.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                config,
                conn: Mutex::new(None),
            }),
            token: StdMutex::new(None),
            connection_id: StdMutex::new(None),
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Connection id returned by the most recent successful handshake.
    pub fn connection_id(&self) -> Option<String> {
        self.connection_id.lock().expect("lock poisoned").clone()
    }

    /// Whether a streaming connection is currently open.
    pub async fn is_connected(&self) -> bool {
        self.shared.conn.lock().await.is_some()
    }

    /// Exchange credentials for a session token.
    ///
    /// Issues exactly one HTTP request. May be called again to refresh
    /// the token while no connection attempt is using the old one; the
    /// new token overwrites the previous one.
    pub async fn init(&self) -> Result<()> {
        let client = TokenClient::new(&self.shared.config)?;
        let token = client.issue().await?;
        *self.token.lock().expect("lock poisoned") = Some(token);
        tracing::debug!("avatar session initialized");
        Ok(())
    }

    /// Open the streaming connection, run the handshake, and spawn the
    /// inbound dispatcher. Returns the server-assigned connection id.
    pub async fn start(&self) -> Result<String> {
        // Holding the connection lock across dial + handshake rejects a
        // concurrent second start and serializes with send/close.
        let mut guard = self.shared.conn.lock().await;
        if guard.is_some() {
            return Err(SdkError::AlreadyStarted);
        }

        let token = self
            .token
            .lock()
            .expect("lock poisoned")
            .clone()
            .ok_or(SdkError::NotInitialized)?;

        let config = &self.shared.config;
        if config.ingress_endpoint.is_empty() {
            return Err(SdkError::Config("missing ingress endpoint URL".to_string()));
        }
        if config.avatar_id.is_empty() {
            return Err(SdkError::Config("missing avatar ID".to_string()));
        }
        if config.app_id.is_empty() {
            return Err(SdkError::Config("missing app ID".to_string()));
        }

        let url = build_ingress_url(config, &token)?;
        let mut request = url.as_str().into_client_request()?;
        if config.auth_transport == AuthTransport::Headers {
            let headers = request.headers_mut();
            headers.insert("X-App-ID", header_value(&config.app_id)?);
            headers.insert("X-Session-Key", header_value(&token)?);
        }

        tracing::debug!(url = %url, "dialing ingress websocket");

        let (ws_stream, _) = match connect_async(request).await {
            Ok(ok) => ok,
            Err(WsError::Http(response)) => {
                let status = response.status().as_u16();
                let body = response
                    .body()
                    .as_deref()
                    .map(|b| String::from_utf8_lossy(b).trim().to_string())
                    .unwrap_or_default();
                return Err(match map_connect_status(status) {
                    Some(code) => SdkError::Connect {
                        code,
                        message: format!("websocket dial failed with status {status}"),
                    },
                    None => SdkError::ConnectRejected { status, body },
                });
            }
            Err(e) => return Err(SdkError::Transport(format!("dial websocket: {e}"))),
        };

        let (mut writer, mut reader) = ws_stream.split();

        let configure = Envelope::ConfigureSession(ConfigurePayload {
            version: PROTOCOL_VERSION.to_string(),
            audio: config.audio,
            egress: config.egress.clone(),
        });
        if let Err(e) = writer.send(Message::Binary(configure.encode().into())).await {
            let _ = writer.close().await;
            return Err(SdkError::Transport(format!("send configure message: {e}")));
        }

        // Exactly one inbound message decides the handshake.
        let outcome = tokio::select! {
            () = config.cancel.cancelled() => Err(SdkError::Cancelled),
            next = reader.next() => confirm_outcome(next),
        };

        let connection_id = match outcome {
            Ok(id) => id,
            Err(e) => {
                // Leave the slot empty so a later start can retry.
                let _ = writer.close().await;
                tracing::warn!(error = %e, "avatar session handshake failed");
                return Err(e);
            }
        };

        let cancel = config.cancel.child_token();
        *guard = Some(Connection {
            writer,
            req_id: None,
            cancel: cancel.clone(),
        });
        drop(guard);

        *self.connection_id.lock().expect("lock poisoned") = Some(connection_id.clone());
        tracing::info!(connection_id = %connection_id, "avatar session established");

        tokio::spawn(dispatch::run(self.shared.clone(), reader, cancel));

        Ok(connection_id)
    }

    /// Send one audio chunk and return the correlation id it was tagged
    /// with.
    ///
    /// A new id is generated lazily on the first chunk of a sequence and
    /// cleared after the chunk with `end = true` is written, so the id is
    /// stable across a whole request and still returned on the final
    /// chunk. Write failures keep the in-progress id.
    pub async fn send_audio(&self, audio: &[u8], end: bool) -> Result<String> {
        let mut guard = self.shared.conn.lock().await;
        let conn = guard.as_mut().ok_or(SdkError::NotConnected)?;

        let req_id = match &conn.req_id {
            Some(id) => id.clone(),
            None => {
                let id = generate_log_id();
                conn.req_id = Some(id.clone());
                id
            }
        };

        let envelope = Envelope::AudioInput(AudioChunk {
            req_id: req_id.clone(),
            audio: audio.to_vec(),
            end,
        });
        conn.writer
            .send(Message::Binary(envelope.encode().into()))
            .await
            .map_err(|e| SdkError::Transport(format!("write audio message: {e}")))?;

        if end {
            conn.req_id = None;
        }

        Ok(req_id)
    }

    /// Close the session.
    ///
    /// Idempotent: with no open connection this is a no-op success and no
    /// callback fires. The dispatcher is not waited on; it observes the
    /// closed socket or the cancelled token on its own.
    pub async fn close(&self) -> Result<()> {
        self.shared.close_connection().await
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| SdkError::Config(format!("header value not encodable: {value:?}")))
}

/// Normalize the ingress endpoint into a WebSocket URL and attach the
/// query parameters for the configured auth transport.
fn build_ingress_url(config: &SessionConfig, token: &str) -> Result<Url> {
    let endpoint = format!(
        "{}{}",
        config.ingress_endpoint.trim_end_matches('/'),
        INGRESS_WEBSOCKET_PATH
    );

    if !endpoint.contains("://") {
        return Err(SdkError::Config(
            "ingress endpoint scheme missing".to_string(),
        ));
    }

    let mut url = Url::parse(&endpoint)
        .map_err(|e| SdkError::Config(format!("parse ingress endpoint: {e}")))?;

    let scheme = match url.scheme().to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(SdkError::Config(format!("unsupported scheme {other:?}")));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| SdkError::Config("ingress endpoint scheme missing".to_string()))?;

    url.query_pairs_mut().append_pair("id", &config.avatar_id);
    if config.auth_transport == AuthTransport::QueryParams {
        url.query_pairs_mut()
            .append_pair("appId", &config.app_id)
            .append_pair("sessionKey", token);
    }

    Ok(url)
}

/// Interpret the single message the handshake waits for.
fn confirm_outcome(next: Option<std::result::Result<Message, WsError>>) -> Result<String> {
    match next {
        None => Err(SdkError::Handshake(
            "connection closed before confirmation".to_string(),
        )),
        Some(Err(e)) => Err(SdkError::Transport(format!("read confirmation: {e}"))),
        Some(Ok(Message::Binary(payload))) => match Envelope::decode(&payload) {
            Ok(Envelope::ConfirmSession(confirm)) => {
                if confirm.connection_id.is_empty() {
                    Err(SdkError::Handshake("connection id is empty".to_string()))
                } else {
                    Ok(confirm.connection_id)
                }
            }
            Ok(Envelope::Error(Some(err))) => Err(SdkError::Service {
                connection_id: err.connection_id,
                req_id: err.req_id,
                code: err.code,
                message: err.message,
            }),
            Ok(Envelope::Error(None)) => Err(SdkError::MissingErrorPayload),
            Ok(_) => Err(SdkError::Handshake(
                "unexpected message during handshake".to_string(),
            )),
            Err(e) => Err(SdkError::Decode(e)),
        },
        Some(Ok(Message::Close(_))) => Err(SdkError::Handshake(
            "connection closed before confirmation".to_string(),
        )),
        Some(Ok(_)) => Err(SdkError::Handshake(
            "expected a binary frame during handshake".to_string(),
        )),
    }
}
