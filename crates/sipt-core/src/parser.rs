//! The NUL-delimited message parser (spec.md §4.1, §6).
//!
//! Input is a byte string where the start-line, each header, and the
//! header-block terminator are delimited by a single NUL byte; the CRLF-to-
//! NUL adaptation happens in the transport, not here. The body (if any)
//! follows the terminating NUL verbatim.

use crate::error::{Error, Result};
use crate::message::{Headers, Message, Request, Response};
use crate::types::{Method, StatusCode, Uri};

/// Parses one NUL-delimited message. A single unrecoverable error in the
/// start-line, version, or any other required structural element fails
/// the whole parse (spec.md §4.1 parse failure mode); malformed individual
/// header lines are dropped silently by `Headers::add_header`.
pub fn parse_message(input: &[u8]) -> Result<Message> {
    let mut segments = input.split(|&b| b == 0);

    let start_line = segments.next().ok_or(Error::ParseFailed)?;
    let start_line = std::str::from_utf8(start_line).map_err(|_| Error::ParseFailed)?;

    let is_response = start_line.len() >= 4 && start_line[..4].eq_ignore_ascii_case("SIP/");

    let mut headers = Headers::new();
    let mut remaining_body: Option<Vec<u8>> = None;
    for segment in segments {
        if segment.is_empty() {
            // Header-block terminator: whatever is left over (if anything)
            // belongs to the body and is not itself NUL-delimited.
            break;
        }
        let line = match std::str::from_utf8(segment) {
            Ok(l) => l,
            Err(_) => continue,
        };
        headers.add_header(line);
    }

    // Anything after the terminating empty segment, rejoined, is the body.
    // `split` already consumed the NULs up to and including the
    // terminator; reconstruct the remainder from the original buffer.
    if let Some(body_start) = find_body_offset(input) {
        if body_start < input.len() {
            remaining_body = Some(input[body_start..].to_vec());
        }
    }
    let body = remaining_body.unwrap_or_default();

    if is_response {
        parse_status_line(start_line).map(|(status, reason)| {
            Message::Response(Response {
                status,
                reason,
                headers,
                body,
            })
        })
    } else {
        parse_request_line(start_line).map(|(method, uri)| {
            Message::Request(Request {
                method,
                request_uri: uri,
                headers,
                body,
            })
        })
    }
}

/// Finds the byte offset right after the two adjacent NULs that mark the
/// header-block terminator (an empty segment between the last header's
/// NUL and the next one). Returns `None` if no such pair exists.
fn find_body_offset(input: &[u8]) -> Option<usize> {
    input
        .windows(2)
        .position(|w| w == [0, 0])
        .map(|i| i + 2)
}

/// `METHOD SP request-URI SP SIP/major.minor`. Method is uppercased; the
/// request-URI must parse as a `sip:`/`sips:` URI; version must be 2.0
/// (spec.md §4.1).
fn parse_request_line(line: &str) -> Result<(Method, Uri)> {
    let mut parts = line.splitn(3, ' ');
    let method = parts.next().ok_or(Error::ParseFailed)?;
    let uri = parts.next().ok_or(Error::ParseFailed)?;
    let version = parts.next().ok_or(Error::ParseFailed)?;

    check_version(version)?;
    let method: Method = method.parse().map_err(|_| Error::ParseFailed)?;
    let uri: Uri = uri.parse().map_err(|_| Error::ParseFailed)?;
    Ok((method, uri))
}

/// `SIP/major.minor SP status-code SP reason-text`. Status code must be
/// exactly three digits; reason may be empty with trailing whitespace
/// trimmed, internal whitespace preserved (spec.md §4.1).
fn parse_status_line(line: &str) -> Result<(StatusCode, String)> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or(Error::ParseFailed)?;
    let code = parts.next().ok_or(Error::ParseFailed)?;
    let reason = parts.next().unwrap_or("").trim_end().to_string();

    check_version(version)?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::ParseFailed);
    }
    let code: u16 = code.parse().map_err(|_| Error::ParseFailed)?;
    let status = StatusCode::new(code).map_err(|_| Error::ParseFailed)?;
    Ok((status, reason))
}

fn check_version(version: &str) -> Result<()> {
    let version = version
        .strip_prefix("SIP/")
        .or_else(|| version.strip_prefix("sip/"))
        .ok_or(Error::InvalidVersion)?;
    if version == "2.0" {
        Ok(())
    } else {
        Err(Error::InvalidVersion)
    }
}
