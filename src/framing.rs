use http::Version;

use crate::output::Output;

/// How a response body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `content-length: n`, body is exactly n bytes
    ContentLength(u64),

    /// `transfer-encoding: chunked`, HTTP/1.1 only
    Chunked,

    /// No length header, `connection: close`; the body runs until the
    /// connection closes. The only option for HTTP/1.0 when the length
    /// is unknown, since 1.0 clients cannot parse a chunk envelope.
    CloseDelimited,
}

impl Framing {
    /// Whether the connection can carry another exchange after this body.
    pub fn keeps_alive(self, version: Version) -> bool {
        version == Version::HTTP_11 && self != Framing::CloseDelimited
    }
}

/// The commit-time framing decision. Pure, and evaluated exactly once per
/// exchange, at the instant the commit fires.
///
/// Priority order:
/// 1. a content-length declared while the buffer was still empty is
///    honored as-is;
/// 2. a late declaration (buffer nonempty at declaration time) is
///    ignored here: it never forces a commit and never wins framing;
/// 3. an explicit flush or a buffer overflow before completion means the
///    total is unknown: chunked on HTTP/1.1, close-delimited on HTTP/1.0;
/// 4. otherwise the accumulated buffer is the whole body and its length
///    becomes the content-length (including zero bytes written).
pub(crate) fn select(out: &Output) -> Framing {
    if let Some(len) = out.early_declared() {
        return Framing::ContentLength(len);
    }

    if out.flush_requested || out.overflowed {
        return if out.version == Version::HTTP_11 {
            Framing::Chunked
        } else {
            Framing::CloseDelimited
        };
    }

    Framing::ContentLength(out.bytes_written)
}
