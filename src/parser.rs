//! Slice-level STOMP frame parsing.
//!
//! `parse_frame_slice` walks a raw byte slice and splits out the command
//! line, header lines and body without interpreting them; unescaping and
//! command validation happen in the codec. Returns `Ok(None)` when the
//! slice does not yet hold a complete frame so the codec can wait for more
//! bytes.

use crate::error::DecodeError;

/// Raw parse output: command bytes, header lines as (key, value) byte pairs,
/// optional body, and how many input bytes were consumed.
#[derive(Debug)]
pub(crate) struct RawFrame {
    pub command: Vec<u8>,
    pub headers: Vec<(Vec<u8>, Vec<u8>)>,
    pub body: Vec<u8>,
    pub consumed: usize,
}

fn content_length(headers: &[(Vec<u8>, Vec<u8>)]) -> Result<Option<usize>, DecodeError> {
    for (k, v) in headers {
        if k.eq_ignore_ascii_case(b"content-length") {
            let s = std::str::from_utf8(v)
                .map_err(|_| DecodeError::InvalidContentLength(String::from_utf8_lossy(v).into()))?;
            let trimmed = s.trim();
            return trimmed
                .parse::<usize>()
                .map(Some)
                .map_err(|_| DecodeError::InvalidContentLength(trimmed.to_string()));
        }
    }
    Ok(None)
}

/// Parse one frame from `input`.
///
/// Body extraction follows STOMP 1.2: when `content-length` is present,
/// exactly that many bytes form the body (embedded NULs allowed) and the
/// next byte must be the NUL terminator; otherwise the body runs to the
/// first NUL. A trailing EOL after the NUL is consumed if present.
pub(crate) fn parse_frame_slice(input: &[u8]) -> Result<Option<RawFrame>, DecodeError> {
    let len = input.len();
    let mut pos = 0usize;

    // command line
    let cmd_end = match input.iter().position(|&b| b == b'\n') {
        Some(i) => i,
        None => return Ok(None),
    };
    let mut command = input[..cmd_end].to_vec();
    if command.last() == Some(&b'\r') {
        command.pop();
    }
    pos += cmd_end + 1;

    // header lines until the blank line
    let mut headers: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    loop {
        if pos >= len {
            return Ok(None);
        }
        if input[pos] == b'\n' {
            pos += 1;
            break;
        }
        if input[pos] == b'\r' && input.get(pos + 1) == Some(&b'\n') {
            pos += 2;
            break;
        }
        let line_end = match input[pos..].iter().position(|&b| b == b'\n') {
            Some(i) => i,
            None => return Ok(None),
        };
        let mut line = &input[pos..pos + line_end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        match line.iter().position(|&b| b == b':') {
            Some(colon) => {
                headers.push((line[..colon].to_vec(), line[colon + 1..].to_vec()));
            }
            None => {
                return Err(DecodeError::MalformedHeaderLine(
                    String::from_utf8_lossy(line).into(),
                ));
            }
        }
        pos += line_end + 1;
    }

    // body
    match content_length(&headers)? {
        Some(n) => {
            if pos + n + 1 > len {
                return Ok(None);
            }
            let body = input[pos..pos + n].to_vec();
            pos += n;
            if input[pos] != 0 {
                return Err(DecodeError::MissingNullTerminator);
            }
            pos += 1;
            pos += eat_trailing_eol(&input[pos..]);
            Ok(Some(RawFrame {
                command,
                headers,
                body,
                consumed: pos,
            }))
        }
        None => match input[pos..].iter().position(|&b| b == 0) {
            Some(nul) => {
                let body = input[pos..pos + nul].to_vec();
                pos += nul + 1;
                pos += eat_trailing_eol(&input[pos..]);
                Ok(Some(RawFrame {
                    command,
                    headers,
                    body,
                    consumed: pos,
                }))
            }
            None => Ok(None),
        },
    }
}

fn eat_trailing_eol(rest: &[u8]) -> usize {
    match rest {
        [b'\r', b'\n', ..] => 2,
        [b'\n', ..] => 1,
        _ => 0,
    }
}
