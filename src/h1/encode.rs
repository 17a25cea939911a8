use bytes::{Bytes, BytesMut};
use http::{StatusCode, Version};

use crate::{Framing, Headers};

/// Terminates a chunked body: zero-length chunk, then the empty trailer
/// section.
pub(crate) const CHUNKED_BODY_END: &[u8] = b"0\r\n\r\n";

/// Header names derived from the chosen framing. User-set values for
/// these are dropped at encode time: the commit decision owns them.
const FRAMING_OWNED: &[&str] = &["content-length", "transfer-encoding", "connection"];

/// Encode the status line and header block, including the header derived
/// from the framing decision.
pub(crate) fn encode_head(
    version: Version,
    status: StatusCode,
    headers: &Headers,
    framing: Framing,
) -> Bytes {
    let mut out = BytesMut::with_capacity(256);

    if version == Version::HTTP_11 {
        out.extend_from_slice(b"HTTP/1.1 ");
    } else {
        out.extend_from_slice(b"HTTP/1.0 ");
    }
    out.extend_from_slice(status.as_str().as_bytes());
    out.extend_from_slice(b" ");
    out.extend_from_slice(status.canonical_reason().unwrap_or("").as_bytes());
    out.extend_from_slice(b"\r\n");

    for header in headers {
        if FRAMING_OWNED
            .iter()
            .any(|owned| header.name.eq_ignore_ascii_case(owned))
        {
            continue;
        }
        out.extend_from_slice(header.name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(&header.value);
        out.extend_from_slice(b"\r\n");
    }

    match framing {
        Framing::ContentLength(len) => {
            out.extend_from_slice(b"content-length: ");
            out.extend_from_slice(len.to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        Framing::Chunked => {
            out.extend_from_slice(b"transfer-encoding: chunked\r\n");
        }
        Framing::CloseDelimited => {
            out.extend_from_slice(b"connection: close\r\n");
        }
    }

    out.extend_from_slice(b"\r\n");
    out.freeze()
}

/// Wrap a payload in one chunk envelope: `<hex-len>\r\n<bytes>\r\n`.
/// Callers must not pass an empty payload, a zero-length chunk means EOF.
pub(crate) fn encode_chunk(payload: &[u8]) -> Bytes {
    debug_assert!(!payload.is_empty());
    let mut out = BytesMut::with_capacity(payload.len() + 16);
    out.extend_from_slice(format!("{:x}\r\n", payload.len()).as_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\r\n");
    out.freeze()
}
