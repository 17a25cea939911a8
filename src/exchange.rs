use std::rc::Rc;

use bytes::Bytes;
use http::{StatusCode, Version};
use tracing::debug;

use crate::{
    error::{AsyncError, OutputError},
    framing,
    h1::{encode, OverflowPolicy, ServerConf},
    lifecycle::{AsyncEvents, AsyncGate, Verdict},
    output::Output,
    AsyncHandle, Framing, ServeOutcome,
};

/// Where committed bytes go. The transport is an ordered byte stream per
/// exchange; `flush` may block on backpressure, which callers tolerate as
/// an ordinary I/O boundary.
#[allow(async_fn_in_trait)] // we never require Send
pub trait Transport {
    type Error: std::error::Error + 'static;

    async fn send(&mut self, data: Bytes) -> Result<(), Self::Error>;
    async fn flush(&mut self) -> Result<(), Self::Error>;
}

/// One request/response exchange: the response state, the transport it
/// drains into, and the async lifecycle gate. Owned by the serve loop,
/// mutated only by the handler chain (directly or via a dispatched
/// second pass).
pub struct Exchange<T: Transport> {
    out: Output,
    transport: T,
    framing: Option<Framing>,
    gate: AsyncGate,
    dispatched: bool,
    conf: Rc<ServerConf>,
}

impl<T: Transport> Exchange<T> {
    pub(crate) fn new(transport: T, version: Version, conf: Rc<ServerConf>) -> Self {
        Self {
            out: Output::new(version, conf.response_buffer_size),
            transport,
            framing: None,
            gate: AsyncGate::new(),
            dispatched: false,
            conf,
        }
    }

    /// Whether the status line and headers have been sent. One-way.
    pub fn is_committed(&self) -> bool {
        self.out.committed
    }

    /// Whether this invocation is a re-entry caused by
    /// [`AsyncHandle::dispatch`]. Handlers check this before starting
    /// another async cycle.
    pub fn was_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Claim the exchange. Unclaimed exchanges default to 404.
    pub fn mark_handled(&mut self) {
        self.out.handled = true;
    }

    /// Ignored once committed: the status line is already on the wire.
    pub fn set_status(&mut self, status: StatusCode) {
        if self.out.committed {
            debug!(%status, "ignoring status change after commit");
            return;
        }
        self.out.status = status;
    }

    /// Ignored once committed: headers are frozen at commit.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<Bytes>) {
        if self.out.committed {
            debug!("ignoring header change after commit");
            return;
        }
        self.out.headers.set(name, value);
    }

    /// Change the buffer capacity for this exchange. Only meaningful
    /// before the first write.
    pub fn set_buffer_size(&mut self, size: usize) {
        self.out.set_buffer_size(size);
    }

    /// Declare the body length. Declared before any write, the length is
    /// honored: the response commits by itself the instant that many
    /// bytes have been written, and anything past the declared count is
    /// accepted but dropped. Declared after bytes are buffered, it is
    /// recorded but wins nothing: neither a commit nor the framing.
    pub async fn set_content_length(&mut self, len: u64) -> Result<(), OutputError<T::Error>> {
        if self.out.committed {
            debug!(len, "ignoring content-length declaration after commit");
            return Ok(());
        }
        self.out.declare_length(len);
        if self.out.early_declared() == Some(self.out.bytes_written) {
            // declared zero: there is nothing left to wait for
            self.commit().await?;
        }
        Ok(())
    }

    /// Append bytes to the response. Never performs I/O unless this very
    /// call triggers the commit (declared length reached, or overflow).
    pub async fn write(&mut self, data: &[u8]) -> Result<(), OutputError<T::Error>> {
        if self.out.body_ended {
            debug!(len = data.len(), "dropping write after body end");
            return Ok(());
        }
        if self.out.committed {
            return self.write_committed(data).await;
        }

        if let Some(declared) = self.out.early_declared() {
            let remain = declared - self.out.bytes_written;
            let take = remain.min(data.len() as u64) as usize;
            self.out.buf.extend_from_slice(&data[..take]);
            self.out.bytes_written += take as u64;
            if take < data.len() {
                debug!(
                    dropped = data.len() - take,
                    declared, "write past declared content-length"
                );
            }
            // capacity is a commit trigger here too; the declared length
            // still owns the framing
            if self.out.bytes_written == declared {
                self.commit().await?;
            } else if self.overflow_commits(take) {
                self.out.overflowed = true;
                self.commit().await?;
            }
            return Ok(());
        }

        self.out.buf.extend_from_slice(data);
        self.out.bytes_written += data.len() as u64;

        if self.overflow_commits(data.len()) {
            self.out.overflowed = true;
            self.commit().await?;
        }
        Ok(())
    }

    fn overflow_commits(&self, appended: usize) -> bool {
        if self.out.buf.len() <= self.out.buffer_size {
            return false;
        }
        match self.conf.overflow {
            OverflowPolicy::EagerCommit => true,
            OverflowPolicy::AllowOversizedWrite => {
                let single_oversized_write = self.out.buf.len() == appended;
                if single_oversized_write {
                    debug!(
                        len = appended,
                        capacity = self.out.buffer_size,
                        "tolerating oversized single write"
                    );
                }
                !single_oversized_write
            }
        }
    }

    /// Request that buffered bytes reach the client now. The first flush
    /// is a commit trigger; with no length declared it costs the
    /// response its content-length (chunked or close-delimited framing).
    pub async fn flush(&mut self) -> Result<(), OutputError<T::Error>> {
        if self.out.body_ended {
            return Ok(());
        }
        if !self.out.committed {
            self.out.flush_requested = true;
            self.commit().await?;
        } else {
            self.flush_buffered().await?;
        }
        self.transport.flush().await.map_err(OutputError::Transport)
    }

    /// Suspend finalize-on-return for this exchange. The returned handle
    /// resumes it from any task.
    pub fn start_async(&mut self) -> Result<AsyncHandle, AsyncError> {
        self.gate.start()
    }

    async fn write_committed(&mut self, data: &[u8]) -> Result<(), OutputError<T::Error>> {
        match self.framing {
            Some(Framing::ContentLength(total)) => {
                let remain = total.saturating_sub(self.out.bytes_written);
                let take = remain.min(data.len() as u64) as usize;
                self.out.buf.extend_from_slice(&data[..take]);
                self.out.bytes_written += take as u64;
                if take < data.len() {
                    debug!(
                        dropped = data.len() - take,
                        total, "discarding bytes past the declared length"
                    );
                }
            }
            _ => {
                self.out.buf.extend_from_slice(data);
                self.out.bytes_written += data.len() as u64;
            }
        }
        Ok(())
    }

    /// The single commit transition. First trigger wins; every later
    /// call is a no-op.
    async fn commit(&mut self) -> Result<(), OutputError<T::Error>> {
        if self.out.committed {
            return Ok(());
        }
        let framing = framing::select(&self.out);
        debug!(
            ?framing,
            status = %self.out.status,
            bytes_buffered = self.out.buf.len(),
            "committing response"
        );

        let head = encode::encode_head(self.out.version, self.out.status, &self.out.headers, framing);
        self.transport
            .send(head)
            .await
            .map_err(OutputError::Transport)?;
        self.out.committed = true;
        self.framing = Some(framing);
        self.flush_buffered().await
    }

    async fn flush_buffered(&mut self) -> Result<(), OutputError<T::Error>> {
        if self.out.buf.is_empty() {
            return Ok(());
        }
        let payload = self.out.buf.split().freeze();
        let data = match self.framing {
            Some(Framing::Chunked) => encode::encode_chunk(&payload),
            _ => payload,
        };
        self.transport.send(data).await.map_err(OutputError::Transport)
    }

    /// Finalize the response: the sequence run on natural handler-chain
    /// completion, on `complete()`, and after error mapping. Idempotent
    /// once the body has ended.
    pub(crate) async fn finalize(&mut self) -> Result<ServeOutcome, OutputError<T::Error>> {
        if !self.out.committed {
            if !self.out.handled && self.out.bytes_written == 0 {
                // nobody claimed the exchange
                self.out.status = StatusCode::NOT_FOUND;
            }
            self.commit().await?;
        } else {
            self.flush_buffered().await?;
        }

        if !self.out.body_ended {
            self.out.body_ended = true;
            if self.framing == Some(Framing::Chunked) {
                self.transport
                    .send(Bytes::from_static(encode::CHUNKED_BODY_END))
                    .await
                    .map_err(OutputError::Transport)?;
            }
        }
        self.transport.flush().await.map_err(OutputError::Transport)?;

        let keep_alive = match self.framing {
            Some(framing) => framing.keeps_alive(self.out.version),
            None => false,
        };
        Ok(if keep_alive {
            ServeOutcome::KeepAlive
        } else {
            ServeOutcome::Close
        })
    }

    /// Pre-commit error mapping: whatever was buffered is discarded and
    /// a minimal 500 goes out with fixed-length framing.
    pub(crate) async fn finalize_error(&mut self) -> Result<ServeOutcome, OutputError<T::Error>> {
        self.out.replace_with_error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            b"500 Internal Server Error\n",
        );
        self.finalize().await
    }

    pub(crate) fn verdict_on_return(&self) -> Verdict {
        self.gate.verdict_on_return()
    }

    pub(crate) fn take_events(&mut self) -> Option<AsyncEvents> {
        self.gate.take_events()
    }

    pub(crate) fn note_dispatched(&mut self) {
        self.dispatched = true;
        self.gate.rearm();
    }
}
