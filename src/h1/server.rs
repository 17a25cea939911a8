use std::rc::Rc;

use http::Version;
use tracing::{debug, warn};

use crate::{
    error::ServeError,
    lifecycle::{AsyncEvent, Verdict},
    output::DEFAULT_BUFFER_SIZE,
    Exchange, Handler, ServeOutcome, Transport,
};

/// What happens when accumulated writes exceed the buffer capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// A single write into an empty buffer may exceed the capacity
    /// without committing; the buffer grows for that call and the
    /// response can still get a content-length.
    AllowOversizedWrite,

    /// Any write that leaves the buffer over capacity commits the
    /// response (chunked, or close-delimited on HTTP/1.0).
    EagerCommit,
}

pub struct ServerConf {
    /// Response buffer capacity; crossing it is a commit trigger.
    /// Overridable per exchange before the first write.
    pub response_buffer_size: usize,

    pub overflow: OverflowPolicy,
}

impl Default for ServerConf {
    fn default() -> Self {
        Self {
            response_buffer_size: DEFAULT_BUFFER_SIZE,
            overflow: OverflowPolicy::AllowOversizedWrite,
        }
    }
}

/// Drive one exchange from handler invocation to a fully framed response.
///
/// Invokes the handler, suspends when an async cycle is outstanding,
/// re-invokes on dispatch, finalizes on return or complete, and maps
/// handler failures: 500 with a fresh body when nothing was committed, an
/// aborted connection when the head was already on the wire.
pub async fn serve_exchange<T, H>(
    transport: T,
    version: Version,
    conf: Rc<ServerConf>,
    handler: &H,
) -> Result<ServeOutcome, ServeError<T::Error>>
where
    T: Transport,
    H: Handler<T>,
{
    if version != Version::HTTP_10 && version != Version::HTTP_11 {
        return Err(ServeError::UnsupportedVersion(version));
    }

    let mut exchange = Exchange::new(transport, version, conf);

    loop {
        if let Err(err) = handler.handle(&mut exchange).await {
            if exchange.is_committed() {
                warn!(
                    error = %err,
                    "handler failed after commit, aborting with whatever was flushed"
                );
                return Ok(ServeOutcome::Aborted);
            }
            debug!(error = %err, "handler failed before commit, mapping to 500");
            return Ok(exchange.finalize_error().await?);
        }

        match exchange.verdict_on_return() {
            Verdict::Finalize => return Ok(exchange.finalize().await?),
            Verdict::Suspend => {
                debug!("exchange suspended, waiting for dispatch or complete");
                let Some(mut events) = exchange.take_events() else {
                    warn!("suspended with no cycle to wait on, finalizing");
                    return Ok(exchange.finalize().await?);
                };
                match events.recv().await {
                    Some(AsyncEvent::Dispatch) => {
                        debug!("re-entering handler chain after dispatch");
                        exchange.note_dispatched();
                    }
                    Some(AsyncEvent::Complete) => {
                        debug!("async cycle completed, finalizing");
                        return Ok(exchange.finalize().await?);
                    }
                    None => {
                        warn!("async handle dropped without dispatch or complete, finalizing");
                        return Ok(exchange.finalize().await?);
                    }
                }
            }
        }
    }
}
