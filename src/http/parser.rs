//! HTTP message grammar
//!
//! This module recognizes a complete raw HTTP/1.x message and splits it into
//! its start line, raw header block and body. Recognition is pure: it never
//! fails with an error, it either yields the captured fields or nothing.
//!
//! Structure, in order:
//!
//! 1. a request line (`METHOD SP target SP HTTP/d.d`) or a status line
//!    (`HTTP/d.d SP ddd SP phrase`)
//! 2. a line break
//! 3. optionally, header lines, each followed by a line break
//! 4. optionally, a blank line followed by the body (the rest of the input)
//!
//! Line breaks are `\r\n` or a bare `\n`. The start line and header block
//! must be UTF-8 text; the body is raw bytes.

use super::headers::header_lines;
use super::Method;
use std::str::FromStr;

/// Classification of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request,
    Response,
    Invalid,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Invalid => "invalid",
        }
    }
}

/// Recognized start line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartLine<'a> {
    Request {
        method: Method,
        target: &'a str,
        version: &'a str,
    },
    Response {
        version: &'a str,
        status: u16,
        phrase: &'a str,
    },
}

/// Fields captured from a valid raw message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage<'a> {
    pub start: StartLine<'a>,
    /// Raw header block, without its final line break
    pub headers: &'a str,
    /// Everything after the blank line
    pub body: &'a [u8],
}

impl<'a> RawMessage<'a> {
    pub fn kind(&self) -> MessageKind {
        match self.start {
            StartLine::Request { .. } => MessageKind::Request,
            StartLine::Response { .. } => MessageKind::Response,
        }
    }

    pub fn version(&self) -> &'a str {
        match self.start {
            StartLine::Request { version, .. } | StartLine::Response { version, .. } => version,
        }
    }
}

/// Split off the first line, accepting `\r\n` and `\n`; the line must be text
fn split_line(bytes: &[u8]) -> Option<(&str, &[u8])> {
    let lf = bytes.iter().position(|&b| b == b'\n')?;
    let line = std::str::from_utf8(&bytes[..lf]).ok()?;
    Some((line.strip_suffix('\r').unwrap_or(line), &bytes[lf + 1..]))
}

/// `d.d`
fn is_version(version: &str) -> bool {
    matches!(version.as_bytes(), [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit())
}

/// `HTTP/d.d` and nothing else
fn parse_http_version(token: &str) -> Option<&str> {
    token.strip_prefix("HTTP/").filter(|version| is_version(version))
}

/// Strip one or more leading spaces, failing if there are none
fn spaces(text: &str) -> Option<(usize, &str)> {
    let rest = text.trim_start_matches(' ');
    let count = text.len() - rest.len();
    if count == 0 {
        None
    } else {
        Some((count, rest))
    }
}

/// Parse HTTP status line
///
/// Format: HTTP/VERSION STATUS PHRASE
/// Example: HTTP/1.1 200 OK
fn parse_status_line(line: &str) -> Option<StartLine<'_>> {
    let after = line.strip_prefix("HTTP/")?;
    let version = after.get(..3).filter(|v| is_version(v))?;

    let (_, rest) = spaces(&after[3..])?;
    let code = rest.get(..3).filter(|c| c.bytes().all(|b| b.is_ascii_digit()))?;
    let (_, phrase) = spaces(&rest[3..])?;

    if phrase.is_empty() {
        return None;
    }

    Some(StartLine::Response {
        version,
        status: code.parse().ok()?,
        phrase,
    })
}

/// Parse HTTP request line
///
/// Format: METHOD TARGET HTTP/VERSION
/// Example: GET /index.html HTTP/1.1
///
/// The target may be left out (`GET  HTTP/1.1`), in which case it is empty.
fn parse_request_line(line: &str) -> Option<StartLine<'_>> {
    let (token, rest) = line.split_at(line.find(' ')?);
    let method = Method::from_str(token).ok()?;

    let (leading, rest) = spaces(rest)?;
    match rest.find(' ') {
        Some(end) => {
            let (_, tail) = spaces(&rest[end..])?;
            Some(StartLine::Request {
                method,
                target: &rest[..end],
                version: parse_http_version(tail)?,
            })
        }
        None if leading >= 2 => Some(StartLine::Request {
            method,
            target: "",
            version: parse_http_version(rest)?,
        }),
        None => None,
    }
}

fn parse_start_line(line: &str) -> Option<StartLine<'_>> {
    if line.starts_with("HTTP/") {
        parse_status_line(line)
    } else {
        parse_request_line(line)
    }
}

/// Split what follows the start line into the header block and the body
fn split_sections(rest: &[u8]) -> Option<(&str, &[u8])> {
    let mut offset = 0;

    loop {
        let remaining = &rest[offset..];
        if remaining.is_empty() {
            return Some((header_block(&rest[..offset])?, remaining));
        }

        let (line, after) = split_line(remaining)?;
        if line.is_empty() {
            return Some((header_block(&rest[..offset])?, after));
        }

        header_lines(line).ok()?;
        offset += remaining.len() - after.len();
    }
}

/// Header block as text, without its final line break
fn header_block(block: &[u8]) -> Option<&str> {
    let block = std::str::from_utf8(block).ok()?;
    Some(
        block
            .strip_suffix("\r\n")
            .or_else(|| block.strip_suffix('\n'))
            .unwrap_or(block),
    )
}

/// Recognize a raw message held as text
pub fn validate(text: &str) -> Option<RawMessage<'_>> {
    validate_bytes(text.as_bytes())
}

/// Recognize a raw message, capturing its fields on success
pub fn validate_bytes(bytes: &[u8]) -> Option<RawMessage<'_>> {
    let (line, rest) = split_line(bytes)?;
    let start = parse_start_line(line)?;
    let (headers, body) = split_sections(rest)?;

    Some(RawMessage {
        start,
        headers,
        body,
    })
}

/// Classify a raw message
pub fn kind(text: &str) -> MessageKind {
    validate(text)
        .map(|raw| raw.kind())
        .unwrap_or(MessageKind::Invalid)
}
