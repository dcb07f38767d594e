//! Inbound dispatch loop.
//!
//! One task per connection, spawned after a successful handshake. The
//! loop reads until cancellation, a normal close, or a fatal transport
//! error; decode failures on individual messages are reported and the
//! loop keeps reading. Every callback invocation runs on its own task so
//! a slow callback never stalls the next read.

use std::sync::Arc;

use futures::StreamExt;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::{SessionShared, WsReader};
use crate::error::SdkError;
use crate::wire::Envelope;

pub(crate) async fn run(
    shared: Arc<SessionShared>,
    mut reader: WsReader,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("read loop cancelled");
                return;
            }
            next = reader.next() => next,
        };

        let message = match next {
            // Stream ended; the close handshake already happened.
            None => return,
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                if cancel.is_cancelled() {
                    return;
                }
                tracing::warn!(error = %e, "read loop transport failure");
                shared.emit_error(SdkError::Transport(format!("read message: {e}")));
                let _ = shared.close_connection().await;
                return;
            }
        };

        match message {
            Message::Binary(payload) => dispatch_envelope(&shared, &payload),
            Message::Close(frame) => {
                let benign = frame
                    .as_ref()
                    .map_or(true, |f| matches!(f.code, CloseCode::Normal | CloseCode::Away));
                if benign {
                    tracing::debug!("read loop observed close");
                    return;
                }
                let detail = frame.map_or_else(String::new, |f| format!("{} {}", f.code, f.reason));
                shared.emit_error(SdkError::Transport(format!("connection closed: {detail}")));
                let _ = shared.close_connection().await;
                return;
            }
            // Text, ping and pong frames are not part of the protocol.
            _ => {}
        }
    }
}

fn dispatch_envelope(shared: &Arc<SessionShared>, payload: &[u8]) {
    let envelope = match Envelope::decode(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            // Decode failures are not fatal; report and keep reading.
            shared.emit_error(SdkError::Decode(e));
            return;
        }
    };

    match envelope {
        Envelope::Animation(frame) => {
            // Decoding produced owned bytes, so the callback never sees a
            // buffer the transport may reuse.
            let callback = shared.config.on_frame.clone();
            let (data, end) = (frame.data, frame.end);
            tokio::spawn(async move { callback(data, end) });
        }
        Envelope::Error(Some(err)) => {
            shared.emit_error(SdkError::Service {
                connection_id: err.connection_id,
                req_id: err.req_id,
                code: err.code,
                message: err.message,
            });
        }
        Envelope::Error(None) => {
            shared.emit_error(SdkError::MissingErrorPayload);
        }
        // Confirm/configure/audio envelopes are not part of the
        // steady-state inbound protocol.
        _ => {}
    }
}
