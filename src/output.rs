use bytes::BytesMut;
use http::{StatusCode, Version};
use tracing::debug;

use crate::Headers;

/// Default response buffer capacity, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// A content-length declaration. `early` records whether the buffer was
/// still empty when it was made: only early declarations win framing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Declared {
    pub(crate) len: u64,
    pub(crate) early: bool,
}

/// The mutable record of one exchange's output. Owned exclusively by the
/// exchange; logically frozen for status/headers once `committed` is set.
pub(crate) struct Output {
    pub(crate) version: Version,
    pub(crate) status: StatusCode,
    pub(crate) headers: Headers,
    pub(crate) buf: BytesMut,
    pub(crate) buffer_size: usize,
    pub(crate) declared: Option<Declared>,
    pub(crate) bytes_written: u64,
    pub(crate) committed: bool,
    pub(crate) handled: bool,
    pub(crate) flush_requested: bool,
    pub(crate) overflowed: bool,
    pub(crate) body_ended: bool,
}

impl Output {
    pub(crate) fn new(version: Version, buffer_size: usize) -> Self {
        Self {
            version,
            status: StatusCode::OK,
            headers: Headers::default(),
            buf: BytesMut::new(),
            buffer_size,
            declared: None,
            bytes_written: 0,
            committed: false,
            handled: false,
            flush_requested: false,
            overflowed: false,
            body_ended: false,
        }
    }

    /// The early declaration currently in force, if any.
    pub(crate) fn early_declared(&self) -> Option<u64> {
        match self.declared {
            Some(Declared { len, early: true }) => Some(len),
            _ => None,
        }
    }

    pub(crate) fn declare_length(&mut self, len: u64) {
        let early = self.bytes_written == 0;
        if !early {
            debug!(len, "late content-length declaration, recorded but not honored");
        }
        self.declared = Some(Declared { len, early });
    }

    /// Resizing the buffer is only meaningful before the first write.
    pub(crate) fn set_buffer_size(&mut self, size: usize) {
        if self.bytes_written > 0 {
            debug!(size, "ignoring buffer size change after first write");
            return;
        }
        self.buffer_size = size;
    }

    /// Throw away everything buffered and recorded so far and replace it
    /// with a synthesized error body. Only legal before commit.
    pub(crate) fn replace_with_error_body(&mut self, status: StatusCode, body: &[u8]) {
        debug_assert!(!self.committed);
        self.buf.clear();
        self.headers.clear();
        self.declared = None;
        self.flush_requested = false;
        self.overflowed = false;
        self.status = status;
        self.headers.set("content-type", "text/plain");
        self.buf.extend_from_slice(body);
        self.bytes_written = body.len() as u64;
    }
}
