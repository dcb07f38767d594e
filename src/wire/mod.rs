//! Binary wire format for the avatar streaming protocol.
//!
//! Every WebSocket frame carries exactly one [`Envelope`]: a kind byte
//! followed by the variant's fields. Strings and byte blobs are
//! varint-length-prefixed, integers are LEB128 varints, bools are a single
//! byte. The session layer treats this module as an opaque codec: it
//! encodes outbound envelopes, decodes inbound ones, and never inspects
//! animation payloads beyond the end-of-sequence flag.
//!
//! | Kind | Variant          | Direction | Payload                                   |
//! |------|------------------|-----------|-------------------------------------------|
//! | 0x01 | ConfigureSession | C→S       | version, audio settings, egress (optional)|
//! | 0x02 | ConfirmSession   | S→C       | connection id                             |
//! | 0x03 | AudioInput       | C→S       | req id, audio bytes, end flag             |
//! | 0x04 | Animation        | S→C       | req id, frame bytes, end flag             |
//! | 0x05 | ServerError      | S→C       | connection id, req id, code, message      |
//! | 0x06 | Error (legacy)   | S→C       | same as 0x05, possibly empty              |

mod envelope;
mod varint;

pub use envelope::{
    AnimationFrame, AudioChunk, ConfigurePayload, ConfirmPayload, Envelope, ErrorPayload,
    MessageKind,
};

use thiserror::Error;

/// Errors produced while decoding an inbound envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload ended before a field was complete.
    #[error("unexpected end of payload")]
    UnexpectedEof,

    /// Unknown kind byte.
    #[error("unknown message kind 0x{0:02x}")]
    UnknownKind(u8),

    /// Varint did not terminate within 64 bits.
    #[error("varint overflow")]
    VarintOverflow,

    /// A length prefix exceeded the remaining payload.
    #[error("length prefix {0} exceeds remaining payload")]
    LengthOutOfBounds(u64),

    /// A bool field held something other than 0 or 1.
    #[error("invalid bool byte 0x{0:02x}")]
    InvalidBool(u8),

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Trailing bytes after the last field of the envelope.
    #[error("{0} trailing bytes after envelope")]
    TrailingBytes(usize),
}
