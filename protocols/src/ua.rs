//! # OPC UA TCP handshake
//!
//! Encoding and decoding of the three UACP messages exchanged before a secure channel is
//! opened: `HEL` from the client, `ACK` or `ERR` from the server. Every message starts with
//! an 8 byte header (3 byte type, chunk type `F`, little-endian total size).

use thiserror::Error;

pub const HEADER_LEN: usize = 8;
pub const PROTOCOL_VERSION: u32 = 0;
pub const MAX_URL_LEN: usize = 4096;
/// Largest handshake message accepted from a peer.
pub const MAX_HANDSHAKE_LEN: u32 = 8 * 1024;

const HELLO_FIXED_LEN: usize = 5 * 4;
const ACK_BODY_LEN: usize = 5 * 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unknown message type {0:?}")]
    UnknownMessageType([u8; 4]),
    #[error("message truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("message size {0} is out of bounds")]
    InvalidSize(u32),
    #[error("string is not valid UTF-8")]
    InvalidString,
    #[error("endpoint url is {0} bytes long")]
    UrlTooLong(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Hello,
    Acknowledge,
    Error,
}

impl MessageType {
    fn tag(self) -> &'static [u8; 3] {
        match self {
            MessageType::Hello => b"HEL",
            MessageType::Acknowledge => b"ACK",
            MessageType::Error => b"ERR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
    pub endpoint_url: String,
}

impl Hello {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: 65536,
            send_buffer_size: 65536,
            max_message_size: 0,
            max_chunk_count: 0,
            endpoint_url: endpoint_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledge {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

impl Default for Acknowledge {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: 65536,
            send_buffer_size: 65536,
            max_message_size: 0,
            max_chunk_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub error: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(Hello),
    Acknowledge(Acknowledge),
    Error(ErrorMessage),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Hello(_) => MessageType::Hello,
            Message::Acknowledge(_) => MessageType::Acknowledge,
            Message::Error(_) => MessageType::Error,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut body: Vec<u8> = Vec::new();
        match self {
            Message::Hello(hello) => {
                if hello.endpoint_url.len() > MAX_URL_LEN {
                    return Err(CodecError::UrlTooLong(hello.endpoint_url.len()));
                }
                for value in [
                    hello.protocol_version,
                    hello.receive_buffer_size,
                    hello.send_buffer_size,
                    hello.max_message_size,
                    hello.max_chunk_count,
                ] {
                    body.extend_from_slice(&value.to_le_bytes());
                }
                write_string(&mut body, &hello.endpoint_url);
            }
            Message::Acknowledge(ack) => {
                for value in [
                    ack.protocol_version,
                    ack.receive_buffer_size,
                    ack.send_buffer_size,
                    ack.max_message_size,
                    ack.max_chunk_count,
                ] {
                    body.extend_from_slice(&value.to_le_bytes());
                }
            }
            Message::Error(err) => {
                body.extend_from_slice(&err.error.to_le_bytes());
                write_string(&mut body, &err.reason);
            }
        }

        let total: usize = HEADER_LEN + body.len();
        let mut buffer: Vec<u8> = Vec::with_capacity(total);
        buffer.extend_from_slice(self.message_type().tag());
        buffer.push(b'F');
        buffer.extend_from_slice(&(total as u32).to_le_bytes());
        buffer.extend_from_slice(&body);
        Ok(buffer)
    }

    /// Decodes one complete message, header included.
    pub fn decode(buffer: &[u8]) -> Result<Message, CodecError> {
        let header: &[u8; HEADER_LEN] = buffer
            .get(..HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or(CodecError::Truncated {
                needed: HEADER_LEN,
                available: buffer.len(),
            })?;
        let (message_type, size) = decode_header(header)?;
        let size: usize = size as usize;
        if buffer.len() < size {
            return Err(CodecError::Truncated {
                needed: size,
                available: buffer.len(),
            });
        }

        let mut reader = Reader::new(&buffer[HEADER_LEN..size]);
        let message = match message_type {
            MessageType::Hello => {
                reader.require(HELLO_FIXED_LEN)?;
                Message::Hello(Hello {
                    protocol_version: reader.u32()?,
                    receive_buffer_size: reader.u32()?,
                    send_buffer_size: reader.u32()?,
                    max_message_size: reader.u32()?,
                    max_chunk_count: reader.u32()?,
                    endpoint_url: reader.string()?,
                })
            }
            MessageType::Acknowledge => {
                reader.require(ACK_BODY_LEN)?;
                Message::Acknowledge(Acknowledge {
                    protocol_version: reader.u32()?,
                    receive_buffer_size: reader.u32()?,
                    send_buffer_size: reader.u32()?,
                    max_message_size: reader.u32()?,
                    max_chunk_count: reader.u32()?,
                })
            }
            MessageType::Error => Message::Error(ErrorMessage {
                error: reader.u32()?,
                reason: reader.string()?,
            }),
        };
        Ok(message)
    }
}

/// Validates a message header and returns its type and total size.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<(MessageType, u32), CodecError> {
    let message_type = match &header[..4] {
        b"HELF" => MessageType::Hello,
        b"ACKF" => MessageType::Acknowledge,
        b"ERRF" => MessageType::Error,
        _ => {
            let mut tag = [0u8; 4];
            tag.copy_from_slice(&header[..4]);
            return Err(CodecError::UnknownMessageType(tag));
        }
    };
    let size: u32 = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if (size as usize) < HEADER_LEN || size > MAX_HANDSHAKE_LEN {
        return Err(CodecError::InvalidSize(size));
    }
    Ok((message_type, size))
}

fn write_string(buffer: &mut Vec<u8>, value: &str) {
    buffer.extend_from_slice(&(value.len() as i32).to_le_bytes());
    buffer.extend_from_slice(value.as_bytes());
}

struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn require(&self, len: usize) -> Result<(), CodecError> {
        let available: usize = self.data.len() - self.cursor;
        if available < len {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN + self.cursor + len,
                available: HEADER_LEN + self.data.len(),
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.require(len)?;
        let slice: &[u8] = &self.data[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let bytes: &[u8] = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// A length-prefixed UTF-8 string; a negative length is the null string.
    fn string(&mut self) -> Result<String, CodecError> {
        let len: i32 = self.u32()? as i32;
        if len <= 0 {
            return Ok(String::new());
        }
        let bytes: &[u8] = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidString)
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
