//! Envelope sum type and its binary encoding.

use super::varint::{get_uvarint, put_uvarint};
use super::DecodeError;
use crate::config::{AudioSettings, EgressConfig};

/// Audio encoding byte: 16-bit little-endian PCM. The only supported value.
pub const AUDIO_ENCODING_PCM_S16LE: u8 = 0x01;

/// Transport compression byte: none. The only supported value.
pub const AUDIO_COMPRESSION_NONE: u8 = 0x00;

/// Kind byte of a wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Client configure-session request, first message of the handshake.
    ConfigureSession = 0x01,
    /// Server confirm-session response carrying the connection id.
    ConfirmSession = 0x02,
    /// Client audio chunk.
    AudioInput = 0x03,
    /// Server animation frame.
    Animation = 0x04,
    /// Server error report.
    ServerError = 0x05,
    /// Legacy error tag, same payload as `ServerError`.
    LegacyError = 0x06,
}

impl MessageKind {
    /// Parse a kind byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(MessageKind::ConfigureSession),
            0x02 => Some(MessageKind::ConfirmSession),
            0x03 => Some(MessageKind::AudioInput),
            0x04 => Some(MessageKind::Animation),
            0x05 => Some(MessageKind::ServerError),
            0x06 => Some(MessageKind::LegacyError),
            _ => None,
        }
    }

    /// The wire byte for this kind.
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }
}

/// Payload of a configure-session message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurePayload {
    /// Protocol version the client speaks.
    pub version: String,
    /// Audio format the client will stream.
    pub audio: AudioSettings,
    /// Egress destination, if the caller configured one.
    pub egress: Option<EgressConfig>,
}

/// Payload of a confirm-session message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPayload {
    /// Server-assigned id for the established connection.
    pub connection_id: String,
}

/// One chunk of client audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Correlation id grouping the chunk sequence.
    pub req_id: String,
    /// Raw PCM bytes.
    pub audio: Vec<u8>,
    /// True on the final chunk of the sequence.
    pub end: bool,
}

/// One server animation frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationFrame {
    /// Correlation id of the request this frame answers.
    pub req_id: String,
    /// Opaque frame bytes; the SDK does not interpret them.
    pub data: Vec<u8>,
    /// True on the final frame of the sequence.
    pub end: bool,
}

/// Payload of a server error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    /// Connection the error refers to, possibly empty.
    pub connection_id: String,
    /// Request the error refers to, possibly empty.
    pub req_id: String,
    /// Numeric service error code.
    pub code: u32,
    /// Human-readable message.
    pub message: String,
}

/// One decoded wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Client configure-session request.
    ConfigureSession(ConfigurePayload),
    /// Server confirm-session response.
    ConfirmSession(ConfirmPayload),
    /// Client audio chunk.
    AudioInput(AudioChunk),
    /// Server animation frame.
    Animation(AnimationFrame),
    /// Server error report; `None` when the message carried no payload.
    Error(Option<ErrorPayload>),
}

impl Envelope {
    /// The kind tag this envelope encodes as.
    pub fn kind(&self) -> MessageKind {
        match self {
            Envelope::ConfigureSession(_) => MessageKind::ConfigureSession,
            Envelope::ConfirmSession(_) => MessageKind::ConfirmSession,
            Envelope::AudioInput(_) => MessageKind::AudioInput,
            Envelope::Animation(_) => MessageKind::Animation,
            Envelope::Error(_) => MessageKind::ServerError,
        }
    }

    /// Encode into one binary frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_hint());
        buf.push(self.kind().as_byte());

        match self {
            Envelope::ConfigureSession(cfg) => {
                put_str(&mut buf, &cfg.version);
                put_uvarint(&mut buf, u64::from(cfg.audio.sample_rate));
                put_uvarint(&mut buf, u64::from(cfg.audio.bitrate));
                buf.push(AUDIO_ENCODING_PCM_S16LE);
                buf.push(AUDIO_COMPRESSION_NONE);
                match &cfg.egress {
                    Some(egress) => {
                        buf.push(1);
                        put_str(&mut buf, &egress.url);
                        put_str(&mut buf, egress.stream_key.as_deref().unwrap_or(""));
                    }
                    None => buf.push(0),
                }
            }
            Envelope::ConfirmSession(confirm) => {
                put_str(&mut buf, &confirm.connection_id);
            }
            Envelope::AudioInput(chunk) => {
                put_str(&mut buf, &chunk.req_id);
                put_bytes(&mut buf, &chunk.audio);
                buf.push(u8::from(chunk.end));
            }
            Envelope::Animation(frame) => {
                put_str(&mut buf, &frame.req_id);
                put_bytes(&mut buf, &frame.data);
                buf.push(u8::from(frame.end));
            }
            Envelope::Error(payload) => {
                if let Some(err) = payload {
                    put_str(&mut buf, &err.connection_id);
                    put_str(&mut buf, &err.req_id);
                    put_uvarint(&mut buf, u64::from(err.code));
                    put_str(&mut buf, &err.message);
                }
            }
        }

        buf
    }

    /// Decode one binary frame.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let kind_byte = *data.first().ok_or(DecodeError::UnexpectedEof)?;
        let kind = MessageKind::from_byte(kind_byte).ok_or(DecodeError::UnknownKind(kind_byte))?;
        let mut pos = 1;

        let envelope = match kind {
            MessageKind::ConfigureSession => {
                let version = get_str(data, &mut pos)?;
                let sample_rate = get_u32(data, &mut pos)?;
                let bitrate = get_u32(data, &mut pos)?;
                // Encoding and compression bytes are fixed; read past them.
                let _encoding = get_byte(data, &mut pos)?;
                let _compression = get_byte(data, &mut pos)?;
                let egress = match get_bool(data, &mut pos)? {
                    true => {
                        let url = get_str(data, &mut pos)?;
                        let stream_key = get_str(data, &mut pos)?;
                        Some(EgressConfig {
                            url,
                            stream_key: (!stream_key.is_empty()).then_some(stream_key),
                        })
                    }
                    false => None,
                };
                Envelope::ConfigureSession(ConfigurePayload {
                    version,
                    audio: AudioSettings {
                        sample_rate,
                        bitrate,
                    },
                    egress,
                })
            }
            MessageKind::ConfirmSession => Envelope::ConfirmSession(ConfirmPayload {
                connection_id: get_str(data, &mut pos)?,
            }),
            MessageKind::AudioInput => Envelope::AudioInput(AudioChunk {
                req_id: get_str(data, &mut pos)?,
                audio: get_bytes(data, &mut pos)?,
                end: get_bool(data, &mut pos)?,
            }),
            MessageKind::Animation => Envelope::Animation(AnimationFrame {
                req_id: get_str(data, &mut pos)?,
                data: get_bytes(data, &mut pos)?,
                end: get_bool(data, &mut pos)?,
            }),
            MessageKind::ServerError | MessageKind::LegacyError => {
                if pos == data.len() {
                    Envelope::Error(None)
                } else {
                    Envelope::Error(Some(ErrorPayload {
                        connection_id: get_str(data, &mut pos)?,
                        req_id: get_str(data, &mut pos)?,
                        code: get_u32(data, &mut pos)?,
                        message: get_str(data, &mut pos)?,
                    }))
                }
            }
        };

        if pos != data.len() {
            return Err(DecodeError::TrailingBytes(data.len() - pos));
        }

        Ok(envelope)
    }

    fn encoded_hint(&self) -> usize {
        match self {
            Envelope::AudioInput(chunk) => chunk.audio.len() + 32,
            Envelope::Animation(frame) => frame.data.len() + 32,
            _ => 64,
        }
    }
}

fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    put_uvarint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

fn get_byte(data: &[u8], pos: &mut usize) -> Result<u8, DecodeError> {
    let byte = *data.get(*pos).ok_or(DecodeError::UnexpectedEof)?;
    *pos += 1;
    Ok(byte)
}

fn get_bool(data: &[u8], pos: &mut usize) -> Result<bool, DecodeError> {
    match get_byte(data, pos)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DecodeError::InvalidBool(other)),
    }
}

fn get_u32(data: &[u8], pos: &mut usize) -> Result<u32, DecodeError> {
    let value = get_uvarint(data, pos)?;
    u32::try_from(value).map_err(|_| DecodeError::VarintOverflow)
}

fn get_bytes(data: &[u8], pos: &mut usize) -> Result<Vec<u8>, DecodeError> {
    let len = get_uvarint(data, pos)?;
    let remaining = data.len() - *pos;
    if len > remaining as u64 {
        return Err(DecodeError::LengthOutOfBounds(len));
    }
    let end = *pos + len as usize;
    let bytes = data[*pos..end].to_vec();
    *pos = end;
    Ok(bytes)
}

fn get_str(data: &[u8], pos: &mut usize) -> Result<String, DecodeError> {
    let bytes = get_bytes(data, pos)?;
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_roundtrip_with_egress() {
        let envelope = Envelope::ConfigureSession(ConfigurePayload {
            version: "2.0".to_string(),
            audio: AudioSettings {
                sample_rate: 16000,
                bitrate: 256_000,
            },
            egress: Some(EgressConfig {
                url: "rtmp://egress.example/live".to_string(),
                stream_key: Some("key-1".to_string()),
            }),
        });

        let decoded = Envelope::decode(&envelope.encode()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_configure_without_egress() {
        let envelope = Envelope::ConfigureSession(ConfigurePayload {
            version: "2.0".to_string(),
            audio: AudioSettings::default(),
            egress: None,
        });

        match Envelope::decode(&envelope.encode()).unwrap() {
            Envelope::ConfigureSession(cfg) => assert!(cfg.egress.is_none()),
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_audio_chunk_roundtrip() {
        let envelope = Envelope::AudioInput(AudioChunk {
            req_id: "20250810123123_abcDEF123456".to_string(),
            audio: vec![0x00, 0x7F, 0xFF, 0x80],
            end: true,
        });

        let frame = envelope.encode();
        assert_eq!(frame[0], MessageKind::AudioInput.as_byte());
        assert_eq!(Envelope::decode(&frame).unwrap(), envelope);
    }

    #[test]
    fn test_error_without_payload() {
        // A bare kind byte is a valid error message with no payload.
        let decoded = Envelope::decode(&[MessageKind::ServerError.as_byte()]).unwrap();
        assert_eq!(decoded, Envelope::Error(None));
    }

    #[test]
    fn test_legacy_error_kind_decodes_as_error() {
        let envelope = Envelope::Error(Some(ErrorPayload {
            connection_id: "conn-1".to_string(),
            req_id: "req-1".to_string(),
            code: 1001,
            message: "bad audio".to_string(),
        }));

        let mut frame = envelope.encode();
        frame[0] = MessageKind::LegacyError.as_byte();

        assert_eq!(Envelope::decode(&frame).unwrap(), envelope);
    }

    #[test]
    fn test_unknown_kind() {
        assert_eq!(
            Envelope::decode(&[0xEE]),
            Err(DecodeError::UnknownKind(0xEE))
        );
    }

    #[test]
    fn test_truncated_payload() {
        let envelope = Envelope::ConfirmSession(ConfirmPayload {
            connection_id: "conn-42".to_string(),
        });
        let frame = envelope.encode();

        assert_eq!(
            Envelope::decode(&frame[..frame.len() - 2]),
            Err(DecodeError::LengthOutOfBounds(7))
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut frame = Envelope::ConfirmSession(ConfirmPayload {
            connection_id: "conn-42".to_string(),
        })
        .encode();
        frame.push(0x00);

        assert_eq!(Envelope::decode(&frame), Err(DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn test_invalid_bool_byte() {
        let mut frame = Envelope::AudioInput(AudioChunk {
            req_id: "r".to_string(),
            audio: vec![1, 2],
            end: false,
        })
        .encode();
        *frame.last_mut().unwrap() = 0x02;

        assert_eq!(Envelope::decode(&frame), Err(DecodeError::InvalidBool(2)));
    }

    #[test]
    fn test_empty_frame() {
        assert_eq!(Envelope::decode(&[]), Err(DecodeError::UnexpectedEof));
    }
}
