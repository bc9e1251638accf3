//! STOMP wire codec.
//!
//! Implements `tokio_util::codec::{Decoder, Encoder}` over `BytesMut`. The
//! session feeds each reassembled WebSocket message payload through the
//! decoder; the encoder produces the bytes handed to the transport.
//!
//! Escaping rules (STOMP 1.1+): `\\` ↔ backslash, `\r` ↔ carriage return,
//! `\n` ↔ line feed, `\c` ↔ colon, applied to header names and values of
//! every command except CONNECT and CONNECTED.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::DecodeError;
use crate::frame::{Command, Frame};
use crate::parser::parse_frame_slice;

/// Items crossing the codec: a full frame or a bare EOL heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    Frame(Frame),
    /// A lone `\n` / `\r\n` on the wire. Recognized before STOMP parsing
    /// and never treated as a protocol frame.
    Heartbeat,
}

fn escape_header_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_header_bytes(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(input.len());
    let mut iter = input.iter();
    while let Some(&b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(b'\\') => out.push(b'\\'),
            Some(b'r') => out.push(b'\r'),
            Some(b'n') => out.push(b'\n'),
            Some(b'c') => out.push(b':'),
            other => {
                let shown = match other {
                    Some(&c) => format!("\\{}", c as char),
                    None => "trailing \\".to_string(),
                };
                return Err(DecodeError::InvalidEscape(shown));
            }
        }
    }
    Ok(out)
}

fn header_string(raw: &[u8], escaped: bool, what: &str) -> Result<String, DecodeError> {
    let bytes = if escaped {
        unescape_header_bytes(raw)?
    } else {
        raw.to_vec()
    };
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(what.to_string()))
}

/// STOMP frame codec.
///
/// `auto_content_length` controls whether the encoder inserts a
/// `content-length` header (exact body byte length) whenever a frame has a
/// body and no explicit `content-length`. This keeps bodies with embedded
/// NUL bytes decodable on the other end.
pub struct StompCodec {
    auto_content_length: bool,
}

impl StompCodec {
    pub fn new() -> Self {
        Self {
            auto_content_length: true,
        }
    }

    pub fn with_auto_content_length(auto: bool) -> Self {
        Self {
            auto_content_length: auto,
        }
    }
}

impl Default for StompCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for StompCodec {
    type Item = StompItem;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StompItem>, DecodeError> {
        match src.chunk() {
            [] => return Ok(None),
            [b'\n', ..] => {
                src.advance(1);
                return Ok(Some(StompItem::Heartbeat));
            }
            [b'\r', b'\n', ..] => {
                src.advance(2);
                return Ok(Some(StompItem::Heartbeat));
            }
            // a lone CR may be the start of a CRLF heartbeat
            [b'\r'] => return Ok(None),
            _ => {}
        }

        let raw = match parse_frame_slice(src.chunk())? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let consumed = raw.consumed;

        let command_str = std::str::from_utf8(&raw.command)
            .map_err(|_| DecodeError::InvalidUtf8("command".to_string()))?;
        let command = Command::parse(command_str)?;
        if !command.is_server_command() {
            return Err(DecodeError::UnsupportedFrame(command_str.to_string()));
        }

        let escaped = command.supports_header_escapes();
        let mut headers: Vec<(String, String)> = Vec::with_capacity(raw.headers.len());
        for (k, v) in &raw.headers {
            let key = header_string(k, escaped, "header key")?;
            // first occurrence of a repeated key wins; later ones are ignored
            if headers.iter().any(|(existing, _)| *existing == key) {
                continue;
            }
            let value = header_string(v, escaped, "header value")?;
            headers.push((key, value));
        }

        src.advance(consumed);
        Ok(Some(StompItem::Frame(Frame {
            command,
            headers,
            body: raw.body,
        })))
    }
}

impl Encoder<StompItem> for StompCodec {
    type Error = DecodeError;

    fn encode(&mut self, item: StompItem, dst: &mut BytesMut) -> Result<(), DecodeError> {
        match item {
            StompItem::Heartbeat => {
                dst.put_u8(b'\n');
            }
            StompItem::Frame(frame) => {
                if !frame.body.is_empty() && !frame.command.allows_body() {
                    return Err(DecodeError::BodyNotAllowed(
                        frame.command.as_str().to_string(),
                    ));
                }

                dst.extend_from_slice(frame.command.as_str().as_bytes());
                dst.put_u8(b'\n');

                let escaped = frame.command.supports_header_escapes();
                let write_header = |dst: &mut BytesMut, k: &str, v: &str| {
                    if escaped {
                        dst.extend_from_slice(escape_header_text(k).as_bytes());
                        dst.put_u8(b':');
                        dst.extend_from_slice(escape_header_text(v).as_bytes());
                    } else {
                        dst.extend_from_slice(k.as_bytes());
                        dst.put_u8(b':');
                        dst.extend_from_slice(v.as_bytes());
                    }
                    dst.put_u8(b'\n');
                };

                for (k, v) in &frame.headers {
                    write_header(dst, k, v);
                }
                if self.auto_content_length
                    && !frame.body.is_empty()
                    && !frame.has_header("content-length")
                {
                    write_header(dst, "content-length", &frame.body.len().to_string());
                }

                dst.put_u8(b'\n');
                dst.extend_from_slice(&frame.body);
                dst.put_u8(0);
            }
        }
        Ok(())
    }
}

/// Encode one frame to a standalone byte buffer (one WebSocket message).
pub fn encode_frame(frame: &Frame, auto_content_length: bool) -> Result<Bytes, DecodeError> {
    let mut codec = StompCodec::with_auto_content_length(auto_content_length);
    let mut buf = BytesMut::new();
    codec.encode(StompItem::Frame(frame.clone()), &mut buf)?;
    Ok(buf.freeze())
}

/// Decode one complete WebSocket message payload into a [`StompItem`].
///
/// Unlike the streaming `Decoder`, input here is a complete message, so a
/// partial frame is a [`DecodeError::Truncated`] error rather than a
/// wait-for-more.
pub fn decode_message(payload: &[u8]) -> Result<StompItem, DecodeError> {
    let mut codec = StompCodec::new();
    let mut buf = BytesMut::from(payload);
    match codec.decode(&mut buf)? {
        Some(item) => Ok(item),
        None => Err(DecodeError::Truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_variants_decode_before_stomp_parsing() {
        assert_eq!(decode_message(b"\n").unwrap(), StompItem::Heartbeat);
        assert_eq!(decode_message(b"\r\n").unwrap(), StompItem::Heartbeat);
    }

    #[test]
    fn client_commands_are_not_decodable() {
        let err = decode_message(b"SEND\ndestination:q\n\n\0").unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedFrame("SEND".to_string()));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = decode_message(b"BOGUS\n\n\0").unwrap_err();
        assert_eq!(err, DecodeError::UnknownCommand("BOGUS".to_string()));
    }

    #[test]
    fn body_rejected_on_bodyless_command() {
        let frame = Frame::new(Command::Subscribe).body(b"nope".to_vec());
        let err = encode_frame(&frame, true).unwrap_err();
        assert_eq!(err, DecodeError::BodyNotAllowed("SUBSCRIBE".to_string()));
    }

    #[test]
    fn auto_content_length_matches_body_bytes() {
        let frame = Frame::send("/queue/a").body("héllo".as_bytes().to_vec());
        let bytes = encode_frame(&frame, true).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        // "héllo" is 6 bytes, 5 chars
        assert!(text.contains("content-length:6\n"), "got: {text}");
    }
}
