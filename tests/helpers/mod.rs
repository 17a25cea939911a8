#![allow(dead_code)]

use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use http::Version;
use plater::Transport;

pub(crate) mod tracing_common;

/// A transport that just collects everything sent through it.
#[derive(Clone, Default)]
pub(crate) struct MemTransport {
    wire: Arc<Mutex<Vec<u8>>>,
}

impl MemTransport {
    pub(crate) fn contents(&self) -> Vec<u8> {
        self.wire.lock().unwrap().clone()
    }
}

impl Transport for MemTransport {
    type Error = Infallible;

    async fn send(&mut self, data: Bytes) -> Result<(), Infallible> {
        self.wire.lock().unwrap().extend_from_slice(&data);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// A response as decoded by a conformant client that only knows the rules
/// of the framing the server chose: declared length, chunk envelope, or
/// read-to-close.
pub(crate) struct WireResponse {
    pub(crate) code: u16,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: Vec<u8>,
    /// Whether the body ended the way its framing promised (full declared
    /// length, or a chunked terminator). False means the client saw a
    /// truncated stream.
    pub(crate) clean_eof: bool,
}

impl WireResponse {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub(crate) fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

pub(crate) fn read_response(wire: &[u8], version: Version) -> WireResponse {
    let head_end = find(wire, b"\r\n\r\n").expect("no end of header block");
    let head = std::str::from_utf8(&wire[..head_end]).unwrap();
    let mut lines = head.split("\r\n");

    let status_line = lines.next().unwrap();
    let mut parts = status_line.splitn(3, ' ');
    let proto = parts.next().unwrap();
    assert!(proto == "HTTP/1.0" || proto == "HTTP/1.1", "bad proto {proto}");
    let code: u16 = parts.next().unwrap().parse().unwrap();

    let mut headers = HashMap::new();
    for line in lines {
        let (name, value) = line.split_once(':').unwrap();
        headers.insert(
            name.trim().to_ascii_lowercase(),
            value.trim().to_ascii_lowercase(),
        );
    }

    let rest = &wire[head_end + 4..];
    let (body, clean_eof) = if let Some(len) = headers.get("content-length") {
        let len: usize = len.parse().unwrap();
        let take = len.min(rest.len());
        assert_eq!(
            rest.len(),
            take,
            "bytes on the wire past the declared length"
        );
        (rest[..take].to_vec(), take == len)
    } else if headers.get("transfer-encoding").map(String::as_str) == Some("chunked") {
        read_chunked_body(rest)
    } else {
        if version == Version::HTTP_11 {
            assert_eq!(
                headers.get("connection").map(String::as_str),
                Some("close"),
                "length-less HTTP/1.1 response must announce connection close"
            );
        }
        (rest.to_vec(), true)
    };

    WireResponse {
        code,
        headers,
        body,
        clean_eof,
    }
}

/// `<hex-len>\r\n<bytes>\r\n` repeated, terminated by `0\r\n\r\n`.
/// Truncation (EOF before the terminator) yields `clean_eof == false`.
fn read_chunked_body(mut rest: &[u8]) -> (Vec<u8>, bool) {
    let mut body = Vec::new();
    loop {
        let Some(line_end) = find(rest, b"\r\n") else {
            return (body, false);
        };
        let size_line = std::str::from_utf8(&rest[..line_end]).unwrap();
        let size = usize::from_str_radix(size_line, 16).unwrap();
        rest = &rest[line_end + 2..];

        if size == 0 {
            return (body, rest.starts_with(b"\r\n"));
        }
        if rest.len() < size + 2 {
            body.extend_from_slice(&rest[..size.min(rest.len())]);
            return (body, false);
        }
        body.extend_from_slice(&rest[..size]);
        assert_eq!(&rest[size..size + 2], b"\r\n", "chunk missing its CRLF");
        rest = &rest[size + 2..];
    }
}
